use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Class of replaceable runtime library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFamily {
    /// NVIDIA DLSS super resolution.
    Dlss,
    /// NVIDIA DLSS frame generation.
    DlssFrameGen,
    /// NVIDIA DLSS ray reconstruction.
    DlssRayRecon,
    /// Intel XeSS upscaler.
    Xess,
    /// Intel XeSS frame generation.
    XessFrameGen,
    /// AMD FidelityFX Super Resolution.
    Fsr,
    /// Microsoft DirectStorage runtime.
    DirectStorage,
    /// NVIDIA Streamline plugin or core component.
    Streamline,
}

impl ModuleFamily {
    /// Returns all module families.
    pub fn all() -> &'static [ModuleFamily] {
        &[
            ModuleFamily::Dlss,
            ModuleFamily::DlssFrameGen,
            ModuleFamily::DlssRayRecon,
            ModuleFamily::Xess,
            ModuleFamily::XessFrameGen,
            ModuleFamily::Fsr,
            ModuleFamily::DirectStorage,
            ModuleFamily::Streamline,
        ]
    }

    /// Stable identifier used in config files and on-disk layouts.
    pub fn slug(&self) -> &'static str {
        match self {
            ModuleFamily::Dlss => "dlss",
            ModuleFamily::DlssFrameGen => "dlss_frame_gen",
            ModuleFamily::DlssRayRecon => "dlss_ray_recon",
            ModuleFamily::Xess => "xess",
            ModuleFamily::XessFrameGen => "xess_frame_gen",
            ModuleFamily::Fsr => "fsr",
            ModuleFamily::DirectStorage => "direct_storage",
            ModuleFamily::Streamline => "streamline",
        }
    }
}

impl fmt::Display for ModuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFamily::Dlss => write!(f, "DLSS"),
            ModuleFamily::DlssFrameGen => write!(f, "DLSS Frame Generation"),
            ModuleFamily::DlssRayRecon => write!(f, "DLSS Ray Reconstruction"),
            ModuleFamily::Xess => write!(f, "XeSS"),
            ModuleFamily::XessFrameGen => write!(f, "XeSS Frame Generation"),
            ModuleFamily::Fsr => write!(f, "FSR"),
            ModuleFamily::DirectStorage => write!(f, "DirectStorage"),
            ModuleFamily::Streamline => write!(f, "Streamline"),
        }
    }
}

impl FromStr for ModuleFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ModuleFamily::all()
            .iter()
            .copied()
            .find(|f| f.slug() == wanted)
            .ok_or_else(|| format!("unknown module family '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_roundtrip() {
        for family in ModuleFamily::all() {
            assert_eq!(family.slug().parse::<ModuleFamily>().unwrap(), *family);
        }
    }

    #[test]
    fn parse_is_lenient_about_separators() {
        assert_eq!(
            "DLSS-Frame-Gen".parse::<ModuleFamily>().unwrap(),
            ModuleFamily::DlssFrameGen
        );
        assert!("nope".parse::<ModuleFamily>().is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(ModuleFamily::Dlss.to_string(), "DLSS");
        assert_eq!(ModuleFamily::Xess.to_string(), "XeSS");
    }
}
