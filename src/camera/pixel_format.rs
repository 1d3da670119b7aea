//
// GenCam - GenICam camera configuration and frame acquisition
// Copyright (c) 2020-2024 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Logical pixel formats and their GenICam (PFNC) spellings.
//!

use strum::IntoEnumIterator;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::EnumIter, strum_macros::EnumString, strum_macros::Display)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum PixelFormat {
    Mono8,
    #[strum(serialize = "ycbcr411_8")]
    YCbCr411_8,
    #[strum(serialize = "ycbcr422_8")]
    YCbCr422_8,
    Rgb8,
    Bgr8,
    BayerBggr,
    BayerRggb,
    BayerGrbg,
    BayerGbrg
}

/// Media type and format tag of frames produced in a given pixel format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub media_type: &'static str,
    pub format: &'static str
}

const RAW: &str = "video/x-raw";
const BAYER: &str = "video/x-bayer";

impl PixelFormat {
    /// Parses a logical name; unknown names fall back to `Mono8`.
    pub fn from_name(name: &str) -> PixelFormat {
        match name.parse::<PixelFormat>() {
            Ok(format) => format,
            Err(_) => {
                log::warn!("unknown pixel format \"{}\", using {}", name, PixelFormat::Mono8);
                PixelFormat::Mono8
            }
        }
    }

    /// Device enumeration entries which carry this format.
    pub fn device_names(&self) -> &'static [&'static str] {
        match self {
            PixelFormat::Mono8 => &["Mono8"],
            PixelFormat::YCbCr411_8 => &["YCbCr411_8"],
            PixelFormat::YCbCr422_8 => &["YUV422_8", "YUV422_YUYV_Packed", "YCbCr422_8"],
            PixelFormat::Rgb8 => &["RGB8", "RGB8Packed"],
            PixelFormat::Bgr8 => &["BGR8", "BGR8Packed"],
            PixelFormat::BayerBggr => &["BayerBG8"],
            PixelFormat::BayerRggb => &["BayerRG8"],
            PixelFormat::BayerGrbg => &["BayerGR8"],
            PixelFormat::BayerGbrg => &["BayerGB8"],
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        let (media_type, format) = match self {
            PixelFormat::Mono8 => (RAW, "GRAY8"),
            PixelFormat::YCbCr411_8 => (RAW, "I420"),
            PixelFormat::YCbCr422_8 => (RAW, "YUY2"),
            PixelFormat::Rgb8 => (RAW, "RGB"),
            PixelFormat::Bgr8 => (RAW, "BGR"),
            PixelFormat::BayerBggr => (BAYER, "bggr"),
            PixelFormat::BayerRggb => (BAYER, "rggb"),
            PixelFormat::BayerGrbg => (BAYER, "grbg"),
            PixelFormat::BayerGbrg => (BAYER, "gbrg"),
        };

        OutputFormat{ media_type, format }
    }

    /// Returns the first device entry (in device order) which is one of `device_names`.
    pub fn select_entry<'e>(&self, device_entries: &'e [String]) -> Option<&'e str> {
        device_entries.iter()
            .find(|e| self.device_names().contains(&e.as_str()))
            .map(|s| s.as_str())
    }

    /// Maps a device enumeration entry back to the logical format.
    pub fn from_device_name(name: &str) -> Option<PixelFormat> {
        PixelFormat::iter().find(|f| f.device_names().contains(&name))
    }

    /// Size in bytes of a frame of given dimensions.
    pub fn frame_size(&self, width: usize, height: usize) -> usize {
        match self {
            PixelFormat::Mono8
            | PixelFormat::BayerBggr
            | PixelFormat::BayerRggb
            | PixelFormat::BayerGrbg
            | PixelFormat::BayerGbrg => width * height,

            PixelFormat::YCbCr411_8 => width * height * 3 / 2,
            PixelFormat::YCbCr422_8 => width * height * 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => width * height * 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_logical_name_in_any_case_it_parses() {
        assert_eq!(PixelFormat::YCbCr422_8, PixelFormat::from_name("YCbCr422_8"));
        assert_eq!(PixelFormat::BayerRggb, PixelFormat::from_name("bayerrggb"));
        assert_eq!(PixelFormat::Rgb8, PixelFormat::from_name("RGB8"));
    }

    #[test]
    fn given_unknown_name_mono8_is_used() {
        assert_eq!(PixelFormat::Mono8, PixelFormat::from_name("xyz"));
    }

    #[test]
    fn given_device_entries_first_matching_device_entry_wins() {
        let entries: Vec<String> = ["Mono8", "YCbCr422_8", "YUV422_YUYV_Packed"].iter().map(|s| s.to_string()).collect();
        assert_eq!(Some("YCbCr422_8"), PixelFormat::YCbCr422_8.select_entry(&entries));
        assert_eq!(Some("Mono8"), PixelFormat::Mono8.select_entry(&entries));
        assert_eq!(None, PixelFormat::Rgb8.select_entry(&entries));
    }

    #[test]
    fn given_bayer_format_output_is_bayer_media_type() {
        assert_eq!(OutputFormat{ media_type: "video/x-bayer", format: "gbrg" }, PixelFormat::BayerGbrg.output_format());
        assert_eq!(OutputFormat{ media_type: "video/x-raw", format: "GRAY8" }, PixelFormat::Mono8.output_format());
    }

    #[test]
    fn given_device_spelling_logical_format_is_recovered() {
        assert_eq!(Some(PixelFormat::Bgr8), PixelFormat::from_device_name("BGR8Packed"));
        assert_eq!(None, PixelFormat::from_device_name("Mono16"));
    }
}
