//! Validity checks for tile files on disk.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// First eight bytes of every PNG file.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// How a tile file is judged present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TileCheck {
    /// Regular file with at least one byte.
    #[default]
    NonEmpty,
    /// Non-empty and starts with the PNG signature.
    PngSignature,
}

impl TileCheck {
    /// Checks `path`. Any I/O error counts as invalid.
    pub fn is_valid(self, path: &Path) -> bool {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return false,
        };
        if !meta.is_file() || meta.len() == 0 {
            return false;
        }
        match self {
            TileCheck::NonEmpty => true,
            TileCheck::PngSignature => has_png_signature(path),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TileCheck::NonEmpty => "nonempty",
            TileCheck::PngSignature => "png",
        }
    }
}

impl fmt::Display for TileCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TileCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nonempty" | "non-empty" => Ok(TileCheck::NonEmpty),
            "png" | "png-signature" => Ok(TileCheck::PngSignature),
            other => Err(format!("unknown tile check '{}' (expected nonempty or png)", other)),
        }
    }
}

fn has_png_signature(path: &Path) -> bool {
    let mut header = [0u8; 8];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|_| header == PNG_SIGNATURE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_empty_files_are_invalid() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();

        for check in [TileCheck::NonEmpty, TileCheck::PngSignature] {
            assert!(!check.is_valid(&dir.path().join("absent.png")));
            assert!(!check.is_valid(&empty));
            assert!(!check.is_valid(dir.path()));
        }
    }

    #[test]
    fn test_png_signature() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("ok.png");
        let html = dir.path().join("error.png");
        let short = dir.path().join("short.png");
        let mut body = PNG_SIGNATURE.to_vec();
        body.extend_from_slice(b"IHDR");
        std::fs::write(&png, &body).unwrap();
        std::fs::write(&html, b"<html>502 Bad Gateway</html>").unwrap();
        std::fs::write(&short, &PNG_SIGNATURE[..4]).unwrap();

        assert!(TileCheck::PngSignature.is_valid(&png));
        assert!(!TileCheck::PngSignature.is_valid(&html));
        assert!(!TileCheck::PngSignature.is_valid(&short));
        assert!(TileCheck::NonEmpty.is_valid(&html));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("PNG".parse::<TileCheck>(), Ok(TileCheck::PngSignature));
        assert_eq!("nonempty".parse::<TileCheck>(), Ok(TileCheck::NonEmpty));
        assert!("size".parse::<TileCheck>().is_err());
    }
}
