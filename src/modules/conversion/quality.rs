/// Encoding and manifest parameters for one rung of the adaptive ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub label: &'static str,
    /// Argument of the ffmpeg `scale` filter.
    pub scale: &'static str,
    pub bitrate: &'static str,
    pub max_rate: &'static str,
    pub buf_size: &'static str,
    /// `BANDWIDTH` attribute of the master manifest, in bits per second.
    pub bandwidth: u64,
    /// `RESOLUTION` attribute of the master manifest.
    pub resolution: &'static str,
}

pub const QUALITY_PROFILES: [QualityProfile; 7] = [
    QualityProfile {
        label: "240p",
        scale: "-2:240",
        bitrate: "400k",
        max_rate: "428k",
        buf_size: "600k",
        bandwidth: 400_000,
        resolution: "426x240",
    },
    QualityProfile {
        label: "360p",
        scale: "-2:360",
        bitrate: "800k",
        max_rate: "856k",
        buf_size: "1200k",
        bandwidth: 800_000,
        resolution: "640x360",
    },
    QualityProfile {
        label: "480p",
        scale: "-2:480",
        bitrate: "1400k",
        max_rate: "1498k",
        buf_size: "2100k",
        bandwidth: 1_400_000,
        resolution: "854x480",
    },
    QualityProfile {
        label: "720p",
        scale: "-2:720",
        bitrate: "2800k",
        max_rate: "2996k",
        buf_size: "4200k",
        bandwidth: 2_800_000,
        resolution: "1280x720",
    },
    QualityProfile {
        label: "1080p",
        scale: "-2:1080",
        bitrate: "5000k",
        max_rate: "5350k",
        buf_size: "7500k",
        bandwidth: 5_000_000,
        resolution: "1920x1080",
    },
    QualityProfile {
        label: "1440p",
        scale: "-2:1440",
        bitrate: "8000k",
        max_rate: "8560k",
        buf_size: "12000k",
        bandwidth: 8_000_000,
        resolution: "2560x1440",
    },
    QualityProfile {
        label: "2160p",
        scale: "-2:2160",
        bitrate: "14000k",
        max_rate: "14980k",
        buf_size: "21000k",
        bandwidth: 14_000_000,
        resolution: "3840x2160",
    },
];

pub fn lookup(label: &str) -> Option<&'static QualityProfile> {
    QUALITY_PROFILES.iter().find(|p| p.label == label)
}
