mod object_reader;
mod range_reader;
mod s3_store;
mod store;

pub use object_reader::ObjectRangeReader;
pub use range_reader::{read_i32_le, read_u64_le, RangeReader};
pub use s3_store::{create_s3_client, S3ObjectStore};
pub use store::{ByteRange, ObjectBody, ObjectData, ObjectInfo, ObjectStore, ObjectStream};
