pub mod account;
pub mod file_record;
pub mod post_data;
pub mod submission;

pub use account::Account;
pub use file_record::{FileKind, FileRecord, UploadedFile};
pub use post_data::{
    FilePostData, LoginResponse, PostData, PostResponse, PostedFile, ScalingOptions,
};
pub use submission::{
    CommonOptions, DefaultOptions, FileSubmission, Submission, SubmissionPart, parse_options,
};
