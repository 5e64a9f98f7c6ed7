mod controller;
mod error;
mod media;
mod prompt;
mod provider;
mod settings;

pub use controller::{GenerationPhase, PendingGeneration, StudioController, DEFAULT_ERROR_MESSAGE};
pub use error::{StudioError, StudioResult};
pub use media::{
    data_uri, decode_data_uri, download_file_name, read_reference_image, save_image_handle,
    ReferenceImage,
};
pub use prompt::{build_prompt, DEFAULT_SCENE, REFERENCE_MIN_ENCODED_LEN};
pub use provider::{
    default_provider_registry, DryrunProvider, GeminiProvider, ImageProvider,
    ImageProviderRegistry,
};
pub use settings::ProviderSettings;
