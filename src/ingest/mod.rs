// Document intake
// Validates uploaded files, fingerprints their bytes and extracts page segments

pub mod extractor;
pub mod intake;

pub use extractor::{MetadataValue, Segment, SegmentMetadata, extract_segments};
pub use intake::{ALLOWED_EXTENSIONS, FileIntake, IntakeError, fingerprint_bytes, fingerprint_file};
