use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFps")]
pub struct Fps {
    pub num: u32,
    pub den: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FpsError {
    #[error("fps num must be > 0")]
    ZeroNum,
    #[error("fps den must be > 0")]
    ZeroDen,
    #[error("fps ratio {0:?} is not of the form num:den")]
    Malformed(&'static str),
}

#[derive(Deserialize)]
struct RawFps {
    num: u32,
    den: u32,
}

impl TryFrom<RawFps> for Fps {
    type Error = FpsError;

    fn try_from(raw: RawFps) -> Result<Self, Self::Error> {
        Fps::new(raw.num, raw.den)
    }
}

impl Fps {
    pub fn new(num: u32, den: u32) -> Result<Self, FpsError> {
        if num == 0 {
            return Err(FpsError::ZeroNum);
        }
        if den == 0 {
            return Err(FpsError::ZeroDen);
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    pub fn from_int(fps: u32) -> Result<Self, FpsError> {
        Self::new(fps, 1)
    }

    /// Parses the `num:den` form used by Y4M `F` tags; a bare integer is
    /// accepted as `num:1`.
    pub fn parse_ratio(s: &str) -> Result<Self, FpsError> {
        let (num, den) = match s.split_once(':') {
            Some((n, d)) => (n, d),
            None => (s, "1"),
        };
        let num = num.parse().map_err(|_| FpsError::Malformed("numerator"))?;
        let den = den.parse().map_err(|_| FpsError::Malformed("denominator"))?;
        Self::new(num, den)
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 25, den: 1 }
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    if a == 0 { 1 } else { a }
}
