use std::path::{Path, PathBuf};

use joey_contracts::config::{ConfigField, JoeyConfig};
use joey_contracts::events::EventWriter;
use joey_contracts::history::{History, HistoryEntry};
use serde_json::{json, Value};

use crate::error::{StudioError, StudioResult};
use crate::media::{read_reference_image, save_image_handle, timestamp_millis, ReferenceImage};
use crate::provider::ImageProvider;

pub const DEFAULT_ERROR_MESSAGE: &str = "生成失败，请重试。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Generating,
}

/// A generation that has been started but not yet applied.
///
/// Holds the configuration and reference as they were when the request was
/// issued, so the history entry reflects what was actually sent.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    token: u64,
    config: JoeyConfig,
    reference: ReferenceImage,
}

impl PendingGeneration {
    pub fn config(&self) -> &JoeyConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceImage {
        &self.reference
    }
}

/// Owns all session state and is the only thing allowed to change it.
pub struct StudioController {
    provider: Box<dyn ImageProvider>,
    events: Option<EventWriter>,
    download_dir: PathBuf,
    config: JoeyConfig,
    reference_image: Option<ReferenceImage>,
    current_image: Option<String>,
    history: History,
    loading: bool,
    error: Option<String>,
    next_token: u64,
    active_token: Option<u64>,
    entry_seq: u64,
}

impl StudioController {
    pub fn new(provider: Box<dyn ImageProvider>) -> Self {
        Self {
            provider,
            events: None,
            download_dir: PathBuf::from("."),
            config: JoeyConfig::default(),
            reference_image: None,
            current_image: None,
            history: History::new(),
            loading: false,
            error: None,
            next_token: 0,
            active_token: None,
            entry_seq: 0,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &JoeyConfig {
        &self.config
    }

    pub fn reference_image(&self) -> Option<&ReferenceImage> {
        self.reference_image.as_ref()
    }

    pub fn current_image(&self) -> Option<&str> {
        self.current_image.as_deref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> GenerationPhase {
        if self.loading {
            GenerationPhase::Generating
        } else {
            GenerationPhase::Idle
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn set_configuration_field(&mut self, field: ConfigField, value: impl Into<String>) {
        self.config.set(field, value);
        self.emit(
            "config_updated",
            json!({
                "field": field.key(),
                "value": self.config.get(field),
            }),
        );
    }

    /// Decodes `path` and makes it the reference image. The upload also
    /// becomes the displayed image so it can be checked before generating.
    ///
    /// On failure the previous reference stays in place and the error is
    /// shown to the user.
    pub fn upload_reference_image(&mut self, path: &Path) -> StudioResult<()> {
        match read_reference_image(path) {
            Ok(image) => {
                self.set_reference_image(image);
                Ok(())
            }
            Err(err) => {
                let failure = StudioError::DecodeFailure {
                    path: path.to_path_buf(),
                    message: format!("{:#}", err.root_cause()),
                };
                log::warn!("reference upload failed: {err:#}");
                self.error = Some(failure.to_string());
                self.emit(
                    "reference_upload_failed",
                    json!({
                        "path": path.to_string_lossy(),
                        "error": failure.to_string(),
                    }),
                );
                Err(failure)
            }
        }
    }

    pub fn set_reference_image(&mut self, image: ReferenceImage) {
        self.current_image = Some(image.data_uri());
        self.emit(
            "reference_uploaded",
            json!({
                "mime_type": image.mime_type,
                "encoded_len": image.data.len(),
            }),
        );
        self.reference_image = Some(image);
    }

    /// Starts a generation: checks the reference, raises the loading flag,
    /// clears the previous error and snapshots the request inputs.
    ///
    /// A second call while one is in flight is rejected and leaves state
    /// untouched.
    pub fn begin_generation(&mut self) -> StudioResult<PendingGeneration> {
        if self.loading {
            return Err(StudioError::GenerationInProgress);
        }
        let Some(reference) = self.reference_image.clone() else {
            let err = StudioError::MissingReferenceImage;
            self.error = Some(err.to_string());
            self.emit("generation_rejected", json!({ "error": err.to_string() }));
            return Err(err);
        };

        self.next_token += 1;
        let token = self.next_token;
        self.active_token = Some(token);
        self.loading = true;
        self.error = None;

        log::info!(
            "generation {token} started with provider {}",
            self.provider.name()
        );
        self.emit(
            "generation_started",
            json!({
                "token": token,
                "provider": self.provider.name(),
                "config": config_value(&self.config),
            }),
        );

        Ok(PendingGeneration {
            token,
            config: self.config.clone(),
            reference,
        })
    }

    /// Applies the outcome of `pending`. The loading flag is cleared on both
    /// paths. Tickets that are not the active one are dropped without touching
    /// state.
    pub fn finish_generation(
        &mut self,
        pending: PendingGeneration,
        result: StudioResult<String>,
    ) -> StudioResult<()> {
        if self.active_token != Some(pending.token) {
            log::warn!("ignoring stale generation {}", pending.token);
            return Ok(());
        }
        self.active_token = None;
        self.loading = false;

        match result {
            Ok(image) => {
                self.entry_seq += 1;
                let id = format!("{}-{}", timestamp_millis(), self.entry_seq);
                self.current_image = Some(image.clone());
                self.history
                    .push(HistoryEntry::new(id.clone(), image, pending.config));
                log::info!("generation {} succeeded ({id})", pending.token);
                self.emit(
                    "generation_succeeded",
                    json!({
                        "token": pending.token,
                        "entry_id": id,
                        "history_len": self.history.len(),
                    }),
                );
                Ok(())
            }
            Err(err) => {
                let message = user_message(&err);
                log::error!("generation {} failed: {message}", pending.token);
                self.error = Some(message.clone());
                self.emit(
                    "generation_failed",
                    json!({
                        "token": pending.token,
                        "error": message,
                    }),
                );
                Err(err)
            }
        }
    }

    /// Runs one full generation against the configured provider.
    pub fn generate(&mut self) -> StudioResult<()> {
        let pending = self.begin_generation()?;
        let result = self
            .provider
            .generate(&pending.config, Some(&pending.reference));
        self.finish_generation(pending, result)
    }

    /// Shows a past result. Configuration and history are left alone.
    pub fn select_history_entry(&mut self, id: &str) -> bool {
        let Some(image) = self.history.find(id).map(|entry| entry.image.clone()) else {
            return false;
        };
        self.current_image = Some(image);
        self.emit("history_selected", json!({ "entry_id": id }));
        true
    }

    /// Saves `handle` into the download directory. Session state is not
    /// touched whatever the outcome.
    pub fn download_image(&self, handle: &str) -> StudioResult<PathBuf> {
        match save_image_handle(handle, &self.download_dir) {
            Ok(path) => {
                self.emit(
                    "image_saved",
                    json!({ "path": path.to_string_lossy() }),
                );
                Ok(path)
            }
            Err(err) => {
                log::warn!("image download failed: {err:#}");
                Err(StudioError::InvalidImageHandle(format!("{err:#}")))
            }
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, payload) {
            log::warn!("failed to record {event_type} event: {err:#}");
        }
    }
}

fn user_message(err: &StudioError) -> String {
    let text = err.to_string();
    if text.trim().is_empty() {
        DEFAULT_ERROR_MESSAGE.to_string()
    } else {
        text
    }
}

fn config_value(config: &JoeyConfig) -> Value {
    serde_json::to_value(config).unwrap_or(Value::Null)
}
