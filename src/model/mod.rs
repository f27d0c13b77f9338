mod fingerprint;
mod media_file;

pub use fingerprint::{Fingerprint, FingerprintKind, FingerprintSet, FingerprintValue};
pub use media_file::{MediaFile, MediaKind};
