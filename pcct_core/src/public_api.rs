use crate::{
    errors::{map_error, set_last_error, ErrorCode},
    handle_registry::{register_table, unregister_table, with_table, with_table_mut, HandleId},
    LocalityDomain, PccSearch, Pcct, EntryId,
};
use std::{ffi::CStr, os::raw::c_char};

/// Opaque table handle; 0 is never valid.
pub type PcctHandle = HandleId;

// ─────────────────────────── helpers ─────────────────────────────────── //

#[inline]
fn cstr<'a>(p: *const c_char) -> Result<&'a str, ErrorCode> {
    if p.is_null() {
        return Err(ErrorCode::Utf8Error);
    }
    unsafe { CStr::from_ptr(p) }
        .to_str()
        .map_err(|_| ErrorCode::Utf8Error)
}

#[inline]
fn bytes<'a>(p: *const u8, len: usize) -> Result<&'a [u8], ErrorCode> {
    if p.is_null() {
        return if len == 0 { Ok(&[]) } else { Err(ErrorCode::InvalidHandle) };
    }
    Ok(unsafe { std::slice::from_raw_parts(p, len) })
}

/// NULL `hint` means the Interest carries no forwarding hint.
#[inline]
fn search<'a>(
    name: *const u8,
    name_len: usize,
    hint: *const u8,
    hint_len: usize,
) -> Result<PccSearch<'a>, ErrorCode> {
    let s = PccSearch::new(bytes(name, name_len)?);
    if hint.is_null() {
        Ok(s)
    } else {
        Ok(s.with_fwd_hint(bytes(hint, hint_len)?))
    }
}

#[inline]
fn finish(code: ErrorCode) -> ErrorCode {
    set_last_error(code);
    code
}

// ─── small helper to turn Result<T,ErrorCode> into early-return ──────────
macro_rules! try_c { ($expr:expr) => { match $expr {
    Ok(v)  => v,
    Err(e) => return finish(e),
}}}

// ───────────────────────── lifetime ──────────────────────────────────── //

/// Create a table and store its handle in `*out`.
/// `numa_socket < 0` means no locality preference.
#[no_mangle]
pub extern "C" fn pcct_new(
    id_utf8: *const c_char,
    max_entries: u32,
    numa_socket: i32,
    out: *mut PcctHandle,
) -> ErrorCode {
    if out.is_null() {
        return finish(ErrorCode::InvalidHandle);
    }
    let id = try_c!(cstr(id_utf8));
    let pcct = try_c!(Pcct::new(id, max_entries, LocalityDomain(numa_socket)).map_err(|e| map_error(&e)));
    let handle = try_c!(register_table(pcct).map_err(|e| map_error(&e)));
    unsafe { *out = handle };
    finish(ErrorCode::Success)
}

/// Release all memory. Entry IDs and tokens from this table become invalid.
#[no_mangle]
pub extern "C" fn pcct_close(h: PcctHandle) -> ErrorCode {
    try_c!(unregister_table(h).map_err(|e| map_error(&e)));
    finish(ErrorCode::Success)
}

// ───────────────────────── key index ─────────────────────────────────── //

/// Insert or find an entry. `*out_entry` receives the entry ID and
/// `*out_is_new` whether it was created.
#[no_mangle]
pub extern "C" fn pcct_insert(
    h: PcctHandle,
    hash: u64,
    name: *const u8,
    name_len: usize,
    hint: *const u8,
    hint_len: usize,
    out_entry: *mut u64,
    out_is_new: *mut bool,
) -> ErrorCode {
    if out_entry.is_null() || out_is_new.is_null() {
        return finish(ErrorCode::InvalidHandle);
    }
    let s = try_c!(search(name, name_len, hint, hint_len));
    let res = try_c!(with_table_mut(h, |t| t.insert(hash, &s)).map_err(|e| map_error(&e)));
    let (id, is_new) = try_c!(res.map_err(|e| map_error(&e)));
    unsafe {
        *out_entry = id.to_raw();
        *out_is_new = is_new;
    }
    finish(ErrorCode::Success)
}

/// Find an entry; `NotFound` on a miss.
#[no_mangle]
pub extern "C" fn pcct_find(
    h: PcctHandle,
    hash: u64,
    name: *const u8,
    name_len: usize,
    hint: *const u8,
    hint_len: usize,
    out_entry: *mut u64,
) -> ErrorCode {
    if out_entry.is_null() {
        return finish(ErrorCode::InvalidHandle);
    }
    let s = try_c!(search(name, name_len, hint, hint_len));
    match try_c!(with_table(h, |t| t.find(hash, &s)).map_err(|e| map_error(&e))) {
        Some(id) => {
            unsafe { *out_entry = id.to_raw() };
            finish(ErrorCode::Success)
        }
        None => finish(ErrorCode::NotFound),
    }
}

/// Erase an entry. Erasing a dead entry aborts the process.
#[no_mangle]
pub extern "C" fn pcct_erase(h: PcctHandle, entry: u64) -> ErrorCode {
    try_c!(with_table_mut(h, |t| t.erase(EntryId::from_raw(entry))).map_err(|e| map_error(&e)));
    finish(ErrorCode::Success)
}

#[no_mangle]
pub extern "C" fn pcct_count(h: PcctHandle, out: *mut u64) -> ErrorCode {
    if out.is_null() {
        return finish(ErrorCode::InvalidHandle);
    }
    let n = try_c!(with_table(h, |t| t.len()).map_err(|e| map_error(&e)));
    unsafe { *out = n as u64 };
    finish(ErrorCode::Success)
}

// ───────────────────────── token index ───────────────────────────────── //

/// Assign a token (new or existing) to an entry.
#[no_mangle]
pub extern "C" fn pcct_add_token(h: PcctHandle, entry: u64, out_token: *mut u64) -> ErrorCode {
    if out_token.is_null() {
        return finish(ErrorCode::InvalidHandle);
    }
    let res = try_c!(with_table_mut(h, |t| t.add_token(EntryId::from_raw(entry))).map_err(|e| map_error(&e)));
    let token = try_c!(res.map_err(|e| map_error(&e)));
    unsafe { *out_token = token.value() };
    finish(ErrorCode::Success)
}

#[no_mangle]
pub extern "C" fn pcct_remove_token(h: PcctHandle, entry: u64) -> ErrorCode {
    try_c!(with_table_mut(h, |t| t.remove_token(EntryId::from_raw(entry))).map_err(|e| map_error(&e)));
    finish(ErrorCode::Success)
}

/// Find an entry by token; the upper 16 bits of `token` are ignored.
#[no_mangle]
pub extern "C" fn pcct_find_by_token(h: PcctHandle, token: u64, out_entry: *mut u64) -> ErrorCode {
    if out_entry.is_null() {
        return finish(ErrorCode::InvalidHandle);
    }
    match try_c!(with_table(h, |t| t.find_by_token(token)).map_err(|e| map_error(&e))) {
        Some(id) => {
            unsafe { *out_entry = id.to_raw() };
            finish(ErrorCode::Success)
        }
        None => finish(ErrorCode::NotFound),
    }
}
