pub mod delete_object;
pub mod get_object;
pub mod list_objects;
pub mod put_object;

pub use delete_object::{
    DeleteObjectOperation, DeleteObjectOperationOutcome, DeleteObjectOperationRequest,
};
pub use get_object::{
    GetObjectOperation, GetObjectOperationOutcome, GetObjectOperationRequest,
    GetObjectOperationResult,
};
pub use list_objects::{ListObjectItem, ListObjectsOperation, ListObjectsOperationResult};
pub use put_object::{PutObjectOperation, PutObjectOperationRequest, PutObjectOperationResult};
