//! Error handling and C-ABI error codes for the PIT-CS table

use std::cell::RefCell;
use std::fmt;
use std::os::raw::c_char;

/// Recoverable failures of the Rust API.
///
/// Caller bugs (double erase, stale handles, list misuse) are not listed here:
/// those abort through `assert!` instead of being returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Entry pool full, or every token value is live.
    CapacityExceeded,
    ZeroCapacity,
    InvalidId(String),
    DuplicateId(String),
    NotFound,
    InvalidHandle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded => f.write_str("capacity exceeded"),
            Error::ZeroCapacity => f.write_str("zero capacity"),
            Error::InvalidId(id) => write!(f, "invalid table identifier {id:?}"),
            Error::DuplicateId(id) => write!(f, "table identifier {id:?} already in use"),
            Error::NotFound => f.write_str("not found"),
            Error::InvalidHandle => f.write_str("invalid handle"),
        }
    }
}

impl std::error::Error for Error {}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    CapacityExceeded = 1,
    ZeroCapacity = 2,
    InvalidId = 3,
    DuplicateId = 4,
    InvalidHandle = 5,
    Utf8Error = 6,
    NotFound = 7,
    Unknown = 255,
}

impl ErrorCode {
    /// NUL-terminated so the same bytes serve `pcct_strerror`.
    fn as_cstr(self) -> &'static [u8] {
        match self {
            ErrorCode::Success => b"Success\0",
            ErrorCode::CapacityExceeded => b"Capacity exceeded\0",
            ErrorCode::ZeroCapacity => b"Zero capacity\0",
            ErrorCode::InvalidId => b"Invalid table identifier\0",
            ErrorCode::DuplicateId => b"Duplicate table identifier\0",
            ErrorCode::InvalidHandle => b"Invalid handle\0",
            ErrorCode::Utf8Error => b"UTF-8 conversion error\0",
            ErrorCode::NotFound => b"Not found\0",
            ErrorCode::Unknown => b"Unknown error\0",
        }
    }

    pub fn as_str(self) -> &'static str {
        let bytes = self.as_cstr();
        // every literal above is ASCII
        std::str::from_utf8(&bytes[..bytes.len() - 1]).unwrap_or("Unknown error")
    }
}

// Thread-local last error for C-ABI
thread_local! {
    static LAST_ERROR: RefCell<ErrorCode> = const { RefCell::new(ErrorCode::Success) };
}

pub fn set_last_error(code: ErrorCode) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = code);
}

pub fn get_last_error() -> ErrorCode {
    LAST_ERROR.with(|cell| *cell.borrow())
}

#[no_mangle]
pub extern "C" fn pcct_last_error() -> ErrorCode {
    get_last_error()
}

#[no_mangle]
pub extern "C" fn pcct_strerror(code: ErrorCode) -> *const c_char {
    code.as_cstr().as_ptr() as *const c_char
}

// Map internal Error to ErrorCode
pub fn map_error(e: &Error) -> ErrorCode {
    match e {
        Error::CapacityExceeded => ErrorCode::CapacityExceeded,
        Error::ZeroCapacity => ErrorCode::ZeroCapacity,
        Error::InvalidId(_) => ErrorCode::InvalidId,
        Error::DuplicateId(_) => ErrorCode::DuplicateId,
        Error::NotFound => ErrorCode::NotFound,
        Error::InvalidHandle => ErrorCode::InvalidHandle,
    }
}
