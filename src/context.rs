use crate::datadir::DataDir;
use crate::errno::Errno;
use crate::pj::_opt_string;
use libc::{c_char, c_int, c_void};
use std::ffi::CString;
use std::ptr;

/// PROJ thread context
///
/// Each context is configured from a [`DataDir`] when it is created, so a context
/// created after [`DataDir::set`] reads the authority database from the new location.
pub(crate) struct ThreadContext(ptr::NonNull<proj_sys::PJ_CONTEXT>);

impl ThreadContext {
    pub fn new(data_dir: &DataDir) -> Self {
        // Safety: `proj_context_create` always returns a valid pointer to a thread context.
        let ctx = unsafe {
            let ctx_ptr = proj_sys::proj_context_create();
            ThreadContext::from_raw(ctx_ptr)
        };
        unsafe {
            proj_sys::proj_log_func(ctx.as_ptr(), ptr::null_mut(), Some(forward_log));
        }
        if let Some(dir) = data_dir.resolve() {
            ctx.set_search_path(&dir.to_string_lossy());
        }
        ctx
    }

    /// # Safety
    ///
    /// Must provide a non-null pointer to a PROJ thread context.
    unsafe fn from_raw(ctx_ptr: *mut proj_sys::PJ_CONTEXT) -> Self {
        debug_assert!(!ctx_ptr.is_null());
        ThreadContext(unsafe { ptr::NonNull::new_unchecked(ctx_ptr) })
    }

    pub fn as_ptr(&self) -> *mut proj_sys::PJ_CONTEXT {
        self.0.as_ptr()
    }

    fn set_search_path(&self, path: &str) {
        let Ok(path) = CString::new(path) else {
            log::warn!("ignoring PROJ data directory containing a nul byte: {path:?}");
            return;
        };
        let paths = [path.as_ptr()];
        unsafe {
            proj_sys::proj_context_set_search_paths(self.as_ptr(), 1, paths.as_ptr());
        }
    }

    pub fn errno(&self) -> Errno {
        Errno(unsafe { proj_sys::proj_context_errno(self.as_ptr()) })
    }

    /// Message for the most recent error raised on this context.
    pub fn last_error(&self) -> String {
        let errno = self.errno();
        if errno.is_ok() {
            "unknown PROJ error".to_string()
        } else {
            errno.message(self)
        }
    }

    /// Path of the authority database this context opened, if any could be opened.
    pub fn database_path(&self) -> Option<String> {
        unsafe { _opt_string(proj_sys::proj_context_get_database_path(self.as_ptr())) }
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        // Safety: The pointer being provided to `proj_context_destroy` will always be a valid
        // thread context, so long as the same `ThreadContext` doesn't get dropped twice.
        unsafe { proj_sys::proj_context_destroy(self.0.as_ptr()) };
    }
}

/// Routes PROJ's diagnostics into the `log` facade.
unsafe extern "C" fn forward_log(_app_data: *mut c_void, level: c_int, msg: *const c_char) {
    let Some(msg) = (unsafe { _opt_string(msg) }) else {
        return;
    };
    match level {
        1 => log::error!(target: "geoproj::proj", "{msg}"),
        2 => log::debug!(target: "geoproj::proj", "{msg}"),
        _ => log::trace!(target: "geoproj::proj", "{msg}"),
    }
}
