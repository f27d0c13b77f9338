use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintKind {
    /// 檔案內容的 BLAKE3 hash，作為去重的 key
    Checksum,
    /// 64-bit 感知雜湊
    Phash,
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checksum => write!(f, "checksum"),
            Self::Phash => write!(f, "phash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FingerprintValue {
    Text(String),
    Int(u64),
}

impl FingerprintValue {
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for FingerprintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Int(v) => write!(f, "{v:016x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub kind: FingerprintKind,
    pub value: FingerprintValue,
}

impl Fingerprint {
    #[must_use]
    pub fn checksum(hex: impl Into<String>) -> Self {
        Self {
            kind: FingerprintKind::Checksum,
            value: FingerprintValue::Text(hex.into()),
        }
    }

    #[must_use]
    pub const fn phash(hash: u64) -> Self {
        Self {
            kind: FingerprintKind::Phash,
            value: FingerprintValue::Int(hash),
        }
    }
}

// 儲存格式：{"kind": "phash", "value": "00ff..."}，phash 以 16 位 hex 字串保存
#[derive(Serialize, Deserialize)]
struct StoredFingerprint {
    kind: FingerprintKind,
    value: String,
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        StoredFingerprint {
            kind: self.kind,
            value: self.value.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let stored = StoredFingerprint::deserialize(deserializer)?;
        let value = match stored.kind {
            FingerprintKind::Phash => u64::from_str_radix(&stored.value, 16)
                .map(FingerprintValue::Int)
                .map_err(serde::de::Error::custom)?,
            FingerprintKind::Checksum => FingerprintValue::Text(stored.value),
        };
        Ok(Self {
            kind: stored.kind,
            value,
        })
    }
}

/// 有序的指紋集合，每種類型最多一筆
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintSet(Vec<Fingerprint>);

impl FingerprintSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn get(&self, kind: FingerprintKind) -> Option<&FingerprintValue> {
        self.0.iter().find(|f| f.kind == kind).map(|f| &f.value)
    }

    /// 同類型已存在時就地取代，否則附加到尾端
    pub fn append_unique(&mut self, fingerprint: Fingerprint) {
        if let Some(existing) = self.0.iter_mut().find(|f| f.kind == fingerprint.kind) {
            *existing = fingerprint;
        } else {
            self.0.push(fingerprint);
        }
    }

    #[must_use]
    pub fn phash(&self) -> Option<u64> {
        self.get(FingerprintKind::Phash).and_then(FingerprintValue::as_u64)
    }

    #[must_use]
    pub fn checksum(&self) -> Option<&str> {
        self.get(FingerprintKind::Checksum)
            .and_then(FingerprintValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Fingerprint> for FingerprintSet {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        let mut set = Self::new();
        for fingerprint in iter {
            set.append_unique(fingerprint);
        }
        set
    }
}
