use std::fmt::{Display, Formatter};

use bincode::config::{Fixint, LittleEndian, NoLimit};
use serde::{Deserialize, Serialize};

/// Oracle system change number.
pub type Scn = u64;

const CONFIG: bincode::config::Configuration<LittleEndian, Fixint, NoLimit> =
    bincode::config::legacy();

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
/// Which part of the ingestion an offset belongs to. Snapshot offsets order before stream
/// offsets at the same SCN.
pub enum OffsetPhase {
    Snapshot,
    Stream,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
/// A resumable position.
///
/// Offsets order by `(scn, phase, seq)`. For stream offsets `scn` is the commit SCN of the
/// row's transaction and `seq` the row's index within it. For snapshot offsets `scn` is the
/// flashback SCN and `seq` counts rows across all snapshotted tables.
///
/// `restart_scn` is where mining must restart so that no transaction committing at or after
/// `scn` is missed. For snapshot offsets it is where mining starts after the snapshot, early
/// enough to see transactions that were open at the flashback SCN.
pub struct Offset {
    pub scn: Scn,
    pub phase: OffsetPhase,
    pub seq: u64,
    pub restart_scn: Scn,
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetError {
    #[error("bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("trailing bytes after offset: {0}")]
    TrailingBytes(usize),
}

impl Offset {
    pub fn snapshot(scn: Scn, seq: u64) -> Self {
        Self {
            scn,
            phase: OffsetPhase::Snapshot,
            seq,
            restart_scn: scn,
        }
    }

    /// Sets where mining restarts once the snapshot is done, at most `scn`.
    pub fn with_restart_scn(mut self, restart_scn: Scn) -> Self {
        self.restart_scn = restart_scn.min(self.scn);
        self
    }

    pub fn stream(commit_scn: Scn, seq: u64, restart_scn: Scn) -> Self {
        Self {
            scn: commit_scn,
            phase: OffsetPhase::Stream,
            seq,
            restart_scn: restart_scn.min(commit_scn),
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.phase == OffsetPhase::Snapshot
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, OffsetError> {
        Ok(bincode::encode_to_vec(self, CONFIG)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OffsetError> {
        let (offset, read) = bincode::decode_from_slice(bytes, CONFIG)?;
        if read != bytes.len() {
            return Err(OffsetError::TrailingBytes(bytes.len() - read));
        }
        Ok(offset)
    }
}

impl Display for Offset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            OffsetPhase::Snapshot => "snapshot",
            OffsetPhase::Stream => "stream",
        };
        write!(
            f,
            "{}@{}#{} (restart {})",
            phase, self.scn, self.seq, self.restart_scn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_order() {
        let snapshot = Offset::snapshot(100, 7);
        let stream = Offset::stream(100, 0, 90);
        assert!(snapshot < stream);
        assert!(Offset::stream(100, 1, 90) > stream);
        assert!(Offset::stream(101, 0, 101) > Offset::stream(100, 5, 90));
    }

    #[test]
    fn test_restart_scn_never_after_commit() {
        let offset = Offset::stream(100, 0, 150);
        assert_eq!(offset.restart_scn, 100);

        assert_eq!(Offset::snapshot(100, 3).restart_scn, 100);
        assert_eq!(Offset::snapshot(100, 3).with_restart_scn(95).restart_scn, 95);
        assert_eq!(Offset::snapshot(100, 3).with_restart_scn(120).restart_scn, 100);
    }

    #[test]
    fn test_offset_bytes() {
        let offset = Offset::stream(12_345_678, 3, 12_345_000);
        let bytes = offset.to_bytes().unwrap();
        assert_eq!(Offset::from_bytes(&bytes).unwrap(), offset);

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(matches!(
            Offset::from_bytes(&trailing),
            Err(OffsetError::TrailingBytes(1))
        ));
        assert!(Offset::from_bytes(&bytes[..4]).is_err());
    }
}
