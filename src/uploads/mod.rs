//! Uploaded image files: multipart intake, on-disk storage, the product
//! image list and the public URLs handed back to clients.

pub mod form;
pub mod image_set;
pub mod storage;
pub mod url;

pub use form::{PendingFile, UploadForm};
pub use image_set::{ImageSet, Reconciliation, MAX_PRODUCT_IMAGES};
pub use storage::UploadStore;
pub use url::BaseUrl;
