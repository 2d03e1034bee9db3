use chrono::Utc;
use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Process-wide interner for component ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for placed components.
/// A `Spur` under the hood: 4 bytes and `Copy`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(Spur);

impl ComponentId {
    /// Intern a string as a ComponentId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        ComponentId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Mint a fresh id of the form `component_{unix_millis}_{random}`.
    ///
    /// The random part is 9 base-36 characters drawn from a v4 UUID, so two
    /// ids minted in the same millisecond still differ. Callers that need a
    /// hard guarantee against an existing map check membership and re-mint.
    pub fn mint() -> Self {
        let millis = Utc::now().timestamp_millis();
        Self::intern(&format!("component_{millis}_{}", random_suffix()))
    }
}

/// 9 base-36 characters of randomness.
fn random_suffix() -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = uuid::Uuid::new_v4().as_u128();
    let mut out = String::with_capacity(9);
    for _ in 0..9 {
        out.push(ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}

impl PartialOrd for ComponentId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by string value, not by interning order, so sorted output is
/// stable across processes.
impl Ord for ComponentId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.0 == other.0 {
            return std::cmp::Ordering::Equal;
        }
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComponentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ComponentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ComponentId::intern(&s))
    }
}
