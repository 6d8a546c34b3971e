use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staged_file")]
pub struct Model {
    /// Generated file id (`{job}_{attribute}_{ms}_{suffix}`).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning job. Not a foreign key; jobs live on the remote server.
    #[sea_orm(indexed)]
    pub job_id: String,

    pub attribute_id: String,

    /// Original upload filename.
    pub name: String,

    pub mime_type: String,

    /// Purposefully denormalized so listings need not measure the blob.
    pub size_bytes: i64,

    #[sea_orm(column_type = "Blob")]
    pub data: Vec<u8>,

    /// Creation instant in epoch milliseconds. Integer so the index orders
    /// chronologically regardless of text encoding.
    #[sea_orm(indexed)]
    pub staged_at: i64,
}

impl ActiveModelBehavior for ActiveModel {}
