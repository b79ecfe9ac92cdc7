//! Data models for Media Relay
//!
//! This module defines the core value types that flow through the download
//! pipeline: quality descriptors and their numeric ranks, request identity,
//! download requests and the artifacts they produce.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// An available encoding of a media asset
///
/// `id` is the opaque label supplied by the source (for example `"1920x1080"`
/// or `"720"`); `rank` is the vertical resolution derived from it and is the
/// only key used for ordering and fallback selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityDescriptor {
    /// Label as presented by the source
    pub id: String,
    /// Numeric ordering key
    pub rank: u32,
}

impl QualityDescriptor {
    /// Create a descriptor with an explicit rank
    pub fn new(id: impl Into<String>, rank: u32) -> Self {
        Self {
            id: id.into(),
            rank,
        }
    }

    /// Parse a quality label, deriving the rank from it
    ///
    /// Accepts `WIDTHxHEIGHT` (rank is the height) or a bare number. A trailing
    /// `p` is tolerated (`"720p"`).
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvalidQuality` if no rank can be derived
    pub fn parse(label: &str) -> Result<Self, ModelError> {
        let trimmed = label.trim();
        let rank_part = trimmed
            .rsplit(|c| c == 'x' || c == 'X')
            .next()
            .unwrap_or(trimmed);
        let rank_part = rank_part.strip_suffix('p').unwrap_or(rank_part);

        match rank_part.parse::<u32>() {
            Ok(rank) if rank > 0 => Ok(Self::new(trimmed, rank)),
            _ => Err(ModelError::InvalidQuality {
                label: label.to_string(),
            }),
        }
    }

    /// Check if this quality is strictly smaller than another
    pub fn is_below(&self, other: &QualityDescriptor) -> bool {
        self.rank < other.rank
    }
}

impl PartialOrd for QualityDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualityDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for QualityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Opaque handle identifying where an asset comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceHandle(String);

impl SourceHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the user issuing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(pub u64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requester-{}", self.0)
    }
}

/// What a source offers for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Human-readable title, used for artifact naming and captions
    pub title: String,
    /// Available qualities in source order
    pub qualities: Vec<QualityDescriptor>,
}

impl ResolvedSource {
    /// Find an available quality by label or by rank
    pub fn find(&self, wanted: &QualityDescriptor) -> Option<&QualityDescriptor> {
        self.qualities
            .iter()
            .find(|q| q.id == wanted.id)
            .or_else(|| self.qualities.iter().find(|q| q.rank == wanted.rank))
    }
}

/// A single transfer attempt
///
/// Immutable once handed to the transfer worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Where the asset comes from
    pub source: SourceHandle,
    /// Quality to fetch
    pub quality: QualityDescriptor,
    /// Planned artifact path
    pub destination: PathBuf,
}

impl DownloadRequest {
    pub fn new(source: SourceHandle, quality: QualityDescriptor, destination: PathBuf) -> Self {
        Self {
            source,
            quality,
            destination,
        }
    }

    /// Directory the artifact is written into
    pub fn destination_dir(&self) -> &Path {
        self.destination.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// A finished, verified artifact on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactResult {
    /// Location of the file
    pub path: PathBuf,
    /// Size in bytes as observed after the transfer
    pub size_bytes: u64,
    /// Quality the artifact was fetched at
    pub quality: QualityDescriptor,
    /// When the transfer completed
    pub completed_at: DateTime<Utc>,
}

impl ArtifactResult {
    /// Size in whole mebibytes, for user-facing messages
    pub fn size_mib(&self) -> u64 {
        self.size_bytes / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_labels() {
        let q = QualityDescriptor::parse("1920x1080").unwrap();
        assert_eq!(q.rank, 1080);
        assert_eq!(q.id, "1920x1080");

        assert_eq!(QualityDescriptor::parse("720").unwrap().rank, 720);
        assert_eq!(QualityDescriptor::parse(" 480p ").unwrap().rank, 480);
        assert_eq!(QualityDescriptor::parse("640X360").unwrap().rank, 360);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(QualityDescriptor::parse("hd").is_err());
        assert!(QualityDescriptor::parse("").is_err());
        assert!(QualityDescriptor::parse("1920x").is_err());
        assert!(QualityDescriptor::parse("0").is_err());
    }

    #[test]
    fn test_ordering_uses_rank() {
        let mut qualities = vec![
            QualityDescriptor::parse("1280x720").unwrap(),
            QualityDescriptor::parse("240").unwrap(),
            QualityDescriptor::parse("1920x1080").unwrap(),
        ];
        qualities.sort();
        let ranks: Vec<u32> = qualities.iter().map(|q| q.rank).collect();
        assert_eq!(ranks, vec![240, 720, 1080]);
        assert!(qualities[0].is_below(&qualities[1]));
    }

    #[test]
    fn test_resolved_source_find_by_label_or_rank() {
        let source = ResolvedSource {
            title: "clip".to_string(),
            qualities: vec![
                QualityDescriptor::parse("1920x1080").unwrap(),
                QualityDescriptor::parse("1280x720").unwrap(),
            ],
        };

        let by_rank = QualityDescriptor::parse("720").unwrap();
        assert_eq!(source.find(&by_rank).unwrap().id, "1280x720");

        let missing = QualityDescriptor::parse("480").unwrap();
        assert!(source.find(&missing).is_none());
    }

    #[test]
    fn test_request_destination_dir() {
        let request = DownloadRequest::new(
            SourceHandle::new("clips/sunset"),
            QualityDescriptor::new("720", 720),
            PathBuf::from("downloads/sunset_720.mp4"),
        );
        assert_eq!(request.destination_dir(), Path::new("downloads"));
    }
}
