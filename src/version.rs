use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub tweak: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32, tweak: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            tweak,
        }
    }

    /// Lenient parse of `v1.2.3.4`-style strings. Missing or malformed
    /// components read as zero, so garbage parses to `Version::default()`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let mut parts = trimmed.split('.').map(leading_number);
        Self {
            major: parts.next().unwrap_or_default(),
            minor: parts.next().unwrap_or_default(),
            patch: parts.next().unwrap_or_default(),
            tweak: parts.next().unwrap_or_default(),
        }
    }

    pub fn app() -> Self {
        static APP: OnceLock<Version> = OnceLock::new();
        *APP.get_or_init(|| Self::parse(env!("CARGO_PKG_VERSION")))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Whether content written by `target` can be read by `self`.
    pub fn compatible(&self, target: &Version) -> bool {
        target <= self
    }

    pub fn short(&self) -> String {
        format!("v{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.tweak
        )
    }
}

fn leading_number(part: &str) -> u32 {
    let digits: String = part
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or_default()
}
