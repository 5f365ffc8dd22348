use chauffeur_core::model::{UserId, VideoId};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn video_id_from_i64(v: i64) -> Result<VideoId, StorageError> {
    Ok(VideoId::new(i64_to_u64("video_id", v)?))
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    id_i64("user_id", id.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            video_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(video_id_from_i64(9).unwrap(), VideoId::new(9));
    }

    #[test]
    fn oversized_ids_are_rejected() {
        assert!(user_id_to_i64(UserId::new(u64::MAX)).is_err());
    }
}
