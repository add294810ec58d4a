//! Implementations of the `Storage` trait that can be used by the runtime.

pub mod faulty;
pub mod fs;
pub mod memory;

/// Validates that a partition name contains only allowed characters.
///
/// Allowed characters are: alphanumeric, dash ('-'), and underscore ('_').
pub fn validate_partition_name(partition: &str) -> Result<(), crate::Error> {
    if partition.is_empty()
        || partition
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || ['_', '-'].contains(&c)))
    {
        return Err(crate::Error::PartitionNameInvalid(partition.into()));
    }
    Ok(())
}
