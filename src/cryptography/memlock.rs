/// Best-effort memory locking for derived keys.
///
/// On Unix with the `memlock` feature enabled these attempt to
/// mlock/munlock the slice for the duration of a sensitive operation.
/// Elsewhere they are no-ops. Failures are ignored; the operation
/// proceeds either way.
#[inline]
pub fn lock_slice(_data: &mut [u8]) {
    #[cfg(all(target_family = "unix", feature = "memlock"))]
    {
        // Safety: libc::mlock reads the pointer and length; it does not
        // take ownership. The kernel rounds to page boundaries.
        if _data.is_empty() {
            return;
        }
        let ptr = _data.as_ptr() as *const core::ffi::c_void;
        let rc = unsafe { libc::mlock(ptr, _data.len()) };
        let _ = rc;
    }
}

#[inline]
pub fn unlock_slice(_data: &mut [u8]) {
    #[cfg(all(target_family = "unix", feature = "memlock"))]
    {
        if _data.is_empty() {
            return;
        }
        let ptr = _data.as_ptr() as *const core::ffi::c_void;
        let rc = unsafe { libc::munlock(ptr, _data.len()) };
        let _ = rc;
    }
}
