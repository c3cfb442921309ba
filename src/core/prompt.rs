//! Prompt assembly for image generation, editing and analysis.

use crate::{
    config::settings::{MagicPromptConfig, MagicPromptKind},
    core::dish::{Dish, InlineImage},
    errors::{Error, Result},
    genai::{ImageAttachment, ImageRequest},
};
use std::{fmt, str::FromStr};

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            /// Every option, in menu order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Label shown to users and accepted by `FromStr`.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| Error::Config {
                        message: format!("Unknown {} '{s}'", $what),
                    })
            }
        }
    };
}

choice_enum!(
    /// Photographic style
    Style, "style" {
        Michelin => "Michelin",
        Rustic => "Rustic",
        Minimalist => "Minimalist",
        DarkMoody => "Dark & Moody",
        BrightAiry => "Bright & Airy",
    }
);

choice_enum!(
    /// Rendering effort requested in the prompt
    Quality, "quality" {
        Standard => "Standard",
        High => "High",
        Ultra => "Ultra",
    }
);

choice_enum!(
    /// Output resolution
    ImageSize, "size" {
        OneK => "1K",
        TwoK => "2K",
        FourK => "4K",
    }
);

choice_enum!(
    /// Output aspect ratio
    AspectRatio, "aspect ratio" {
        Landscape => "4:3",
        Square => "1:1",
        Portrait => "3:4",
        Wide => "16:9",
        Tall => "9:16",
    }
);

impl Style {
    const fn direction(self) -> &'static str {
        match self {
            Self::Michelin => {
                "refined Michelin-star plating on fine porcelain, precise garnish, \
                 soft directional light, shallow depth of field"
            }
            Self::Rustic => {
                "rustic presentation on weathered wood and stoneware, natural window \
                 light, generous homely portions"
            }
            Self::Minimalist => {
                "minimalist composition, plenty of negative space, clean neutral \
                 backdrop, even diffused light"
            }
            Self::DarkMoody => {
                "dark and moody scene, deep shadows, a single low-angle key light, \
                 rich contrast"
            }
            Self::BrightAiry => {
                "bright and airy scene, pale surfaces, high-key daylight, fresh and \
                 light colour palette"
            }
        }
    }
}

impl Quality {
    const fn direction(self) -> &'static str {
        match self {
            Self::Standard => "a clean professional food photograph",
            Self::High => "a high-end editorial food photograph with crisp detail",
            Self::Ultra => {
                "an award-winning, ultra-detailed food photograph fit for a magazine cover"
            }
        }
    }
}

impl ImageSize {
    /// Value sent as `imageConfig.imageSize`; 1K is the model default and is omitted.
    #[must_use]
    pub fn api_value(self) -> Option<String> {
        match self {
            Self::OneK => None,
            other => Some(other.label().to_string()),
        }
    }
}

/// Global generation settings of a session
#[derive(Debug, Clone, Default)]
pub struct GenerationSettings {
    /// Photographic style
    pub style: Style,
    /// Rendering effort
    pub quality: Quality,
    /// Output resolution
    pub size: ImageSize,
    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,
    /// Logo used for every dish without its own
    pub logo_image: Option<InlineImage>,
    /// Venue used for every dish without its own
    pub location_image: Option<InlineImage>,
}

const REFERENCE_LABEL: &str = "Reference photo of the dish";
const LOCATION_LABEL: &str = "Photo of the restaurant location";
const LOGO_LABEL: &str = "Restaurant logo";

/// Builds the single image-generation request for a dish.
#[must_use]
pub fn build_generation_prompt(dish: &Dish, settings: &GenerationSettings) -> ImageRequest {
    let mut attachments = Vec::new();
    let mut prompt = format!(
        "Create {} of \"{}\".",
        settings.quality.direction(),
        dish.name
    );

    let description = dish.full_description();
    if !description.is_empty() {
        prompt.push_str(&format!(" The dish: {description}."));
    }
    prompt.push_str(&format!(" Style: {}.", settings.style.direction()));

    if let Some(reference) = &dish.reference_image {
        if dish.reference_locked {
            prompt.push_str(
                " Reproduce the plating, ingredients and arrangement of the reference \
                 photo exactly; only improve lighting, background and photographic quality.",
            );
        } else {
            prompt.push_str(" Use the reference photo as inspiration for the plating.");
        }
        attachments.push(ImageAttachment {
            label: REFERENCE_LABEL.to_string(),
            image: reference.clone(),
        });
    }

    if let Some(location) = dish.location_image.as_ref().or(settings.location_image.as_ref()) {
        prompt.push_str(" Place the dish in the setting shown in the location photo.");
        attachments.push(ImageAttachment {
            label: LOCATION_LABEL.to_string(),
            image: location.clone(),
        });
    }

    if let Some(logo) = dish.logo_image.as_ref().or(settings.logo_image.as_ref()) {
        prompt.push_str(
            " Integrate the restaurant logo discreetly, for example on the plate rim or a \
             napkin; do not distort it.",
        );
        attachments.push(ImageAttachment {
            label: LOGO_LABEL.to_string(),
            image: logo.clone(),
        });
    }

    prompt.push_str(&format!(
        " Frame the shot for a {} aspect ratio. No text, no watermarks.",
        settings.aspect_ratio.label()
    ));

    ImageRequest {
        prompt,
        attachments,
        aspect_ratio: settings.aspect_ratio.label().to_string(),
        image_size: settings.size.api_value(),
    }
}

/// Wraps a user's touch-up instruction.
///
/// # Errors
/// `Intake` when the instruction is blank.
pub fn build_edit_instruction(instruction: &str) -> Result<String> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return Err(Error::Intake {
            message: "Tell me what to change in the photo".to_string(),
        });
    }
    Ok(format!(
        "Edit this food photograph: {instruction}. Keep the dish, plating and composition \
         otherwise unchanged and keep it photorealistic."
    ))
}

/// Prompt used for image analysis.
#[must_use]
pub const fn build_analysis_prompt() -> &'static str {
    "You are a nutritionist and food stylist. For the dish in this photo give an \
     estimated calorie count, protein, carbohydrate and fat per portion, likely \
     allergens, and one sentence of plating feedback. Answer in at most six short lines."
}

/// Finds a configured magic prompt by name, case-insensitively.
#[must_use]
pub fn find_magic_prompt<'a>(
    prompts: &'a [MagicPromptConfig],
    name: &str,
) -> Option<&'a MagicPromptConfig> {
    prompts
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}

/// Display label of a magic prompt kind.
#[must_use]
pub const fn magic_kind_label(kind: MagicPromptKind) -> &'static str {
    match kind {
        MagicPromptKind::Location => "location",
        MagicPromptKind::Logo => "logo",
        MagicPromptKind::Scene => "scene",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::dish::DishDraft;

    fn image(tag: u8) -> InlineImage {
        InlineImage::new("image/png", vec![tag])
    }

    #[test]
    fn test_prompt_merges_dish_and_settings() {
        let mut dish = Dish::from_draft(DishDraft::new("Pizza Diavola", "Spicy salami"));
        dish.magic_prompts.push("on a seaside terrace".to_string());
        let settings = GenerationSettings {
            style: Style::Rustic,
            size: ImageSize::TwoK,
            aspect_ratio: AspectRatio::Square,
            ..GenerationSettings::default()
        };

        let request = build_generation_prompt(&dish, &settings);
        assert!(request.prompt.contains("\"Pizza Diavola\""));
        assert!(request.prompt.contains("Spicy salami. on a seaside terrace"));
        assert!(request.prompt.contains("weathered wood"));
        assert_eq!(request.aspect_ratio, "1:1");
        assert_eq!(request.image_size.as_deref(), Some("2K"));
        assert!(request.attachments.is_empty());
    }

    #[test]
    fn test_locked_reference_requests_exact_plating() {
        let mut dish = Dish::from_draft(DishDraft::new("Tartare", ""));
        dish.reference_image = Some(image(1));
        dish.reference_locked = true;

        let request = build_generation_prompt(&dish, &GenerationSettings::default());
        assert!(request.prompt.contains("exactly"));
        assert_eq!(request.attachments.len(), 1);
        assert_eq!(request.attachments[0].label, REFERENCE_LABEL);
        assert!(request.image_size.is_none());
    }

    #[test]
    fn test_dish_override_beats_global_images() {
        let mut dish = Dish::from_draft(DishDraft::new("Soup", ""));
        dish.logo_image = Some(image(9));
        let settings = GenerationSettings {
            logo_image: Some(image(2)),
            location_image: Some(image(3)),
            ..GenerationSettings::default()
        };

        let request = build_generation_prompt(&dish, &settings);
        assert_eq!(request.attachments.len(), 2);
        assert_eq!(request.attachments[0].label, LOCATION_LABEL);
        assert_eq!(request.attachments[0].image, image(3));
        assert_eq!(request.attachments[1].label, LOGO_LABEL);
        assert_eq!(request.attachments[1].image, image(9));
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!("dark & moody".parse::<Style>().unwrap(), Style::DarkMoody);
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Wide);
        assert_eq!(" 4k ".parse::<ImageSize>().unwrap(), ImageSize::FourK);
        assert!("5:4".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::default(), AspectRatio::Landscape);
        assert_eq!(Quality::ALL.len(), 3);
    }

    #[test]
    fn test_edit_instruction_rejects_blank() {
        assert!(matches!(
            build_edit_instruction("   "),
            Err(Error::Intake { .. })
        ));
        let text = build_edit_instruction("add basil leaves").unwrap();
        assert!(text.contains("add basil leaves"));
    }

    #[test]
    fn test_find_magic_prompt() {
        let prompts = crate::config::AppConfig::default().magic_prompts;
        let found = find_magic_prompt(&prompts, "seaside TERRACE").unwrap();
        assert_eq!(found.kind, MagicPromptKind::Location);
        assert!(find_magic_prompt(&prompts, "nope").is_none());
    }
}
