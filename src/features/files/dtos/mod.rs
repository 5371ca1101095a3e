mod file_dto;

pub use file_dto::{
    DownloadQueryParams, FileDto, FileTransitionDto, QuotaDto, UploadFileForm, MAX_UPLOAD_BYTES,
};
