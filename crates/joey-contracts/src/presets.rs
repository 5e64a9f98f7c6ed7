//! Static suggestion lists for the character form.
//!
//! Nothing here constrains input: every list is offered as a hint and any
//! free-text value is accepted by the configuration model.

pub const JOEY_STYLE_PROMPT: &str = "Anthropomorphic cartoon, bold minimalist outlines, flat colors, LINE FRIENDS style, Schnauzer dog IP illustration named Joey. Characteristics: grey fur, white muzzle/beard, black nose, one ear up and one ear slightly folded, friendly expression, cute proportions.";

pub const PRESET_ACTIONS: &[&str] = &[
    "站立挥手",
    "坐着喝咖啡",
    "开心地奔跑",
    "安静地睡觉",
    "跳舞",
    "使用电脑工作",
    "抱着一颗巨大的爱心",
];

pub const PRESET_CLOTHING: &[&str] = &[
    "经典蓝色卫衣",
    "黄色雨衣",
    "条纹 T 恤",
    "商务西装",
    "圣诞毛衣",
    "厨师服",
    "睡衣",
];

pub const PRESET_ACCESSORIES: &[&str] = &[
    "无",
    "红色围巾",
    "黑框眼镜",
    "酷炫耳机",
    "棒球帽",
    "小背包",
    "墨镜",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectRatioOption {
    pub label: &'static str,
    pub value: &'static str,
}

pub const ASPECT_RATIOS: &[AspectRatioOption] = &[
    AspectRatioOption {
        label: "1:1 正方形",
        value: "1:1",
    },
    AspectRatioOption {
        label: "3:4 人像",
        value: "3:4",
    },
    AspectRatioOption {
        label: "4:3 标准",
        value: "4:3",
    },
    AspectRatioOption {
        label: "9:16 手机竖屏",
        value: "9:16",
    },
    AspectRatioOption {
        label: "16:9 宽屏",
        value: "16:9",
    },
];

/// 1x1 transparent PNG. Shorter than the reference attachment threshold, so
/// it never reaches the provider as a reference part.
pub const PLACEHOLDER_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

/// Maps user input to a ratio token.
///
/// Accepts a token (`16:9`), a full label (`16:9 宽屏`) or the descriptive
/// tail of a label (`宽屏`). Unknown text is passed through trimmed, since the
/// provider is the one that decides what it supports.
pub fn resolve_aspect_ratio(input: &str) -> String {
    let trimmed = input.trim();
    ASPECT_RATIOS
        .iter()
        .find(|option| {
            option.value == trimmed
                || option.label == trimmed
                || option
                    .label
                    .split_once(' ')
                    .map(|(_, tail)| tail == trimmed)
                    .unwrap_or(false)
        })
        .map(|option| option.value.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

pub fn aspect_ratio_label(value: &str) -> Option<&'static str> {
    ASPECT_RATIOS
        .iter()
        .find(|option| option.value == value)
        .map(|option| option.label)
}
