use libc::c_char;
use std::ffi::{CString, NulError};
use std::ptr;

/// `KEY=VALUE` options for PROJ calls that take a null-terminated `char* const*` list.
///
/// Entries are converted to C strings as they are pushed and the pointer array is kept
/// null-terminated after every push, so [`as_ptr`](Self::as_ptr) is always ready to hand
/// to PROJ for as long as the list is alive.
///
/// ```ignore
/// let options = OptionList::new().with("MULTILINE", "NO")?;
/// unsafe { proj_as_wkt(ctx, pj, PJ_WKT_TYPE_PJ_WKT2_2019, options.as_ptr()) };
/// ```
#[derive(Debug)]
pub(crate) struct OptionList {
    entries: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl OptionList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            ptrs: vec![ptr::null()],
        }
    }

    /// Builder flavor of [`push`](Self::push).
    pub fn with(mut self, key: &str, value: &str) -> Result<Self, NulError> {
        self.push(key, value)?;
        Ok(self)
    }

    pub fn push(&mut self, key: &str, value: &str) -> Result<(), NulError> {
        debug_assert_eq!(self.ptrs.len(), self.entries.len() + 1);
        let entry = CString::new(format!("{key}={value}"))?;
        // the heap buffer of a CString does not move with it
        self.ptrs.insert(self.ptrs.len() - 1, entry.as_ptr());
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Null when the list is empty, which PROJ documents as "no options".
    pub fn as_ptr(&self) -> *const *const c_char {
        debug_assert_eq!(self.ptrs.last(), Some(&ptr::null()));
        if self.entries.is_empty() {
            ptr::null()
        } else {
            self.ptrs.as_ptr()
        }
    }
}

impl Default for OptionList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_empty_list_is_null() {
        let options = OptionList::new();
        assert_eq!(options.len(), 0);
        assert!(options.as_ptr().is_null());
    }

    #[test]
    fn test_entries_are_joined_and_terminated() {
        let options = OptionList::new()
            .with("MULTILINE", "NO")
            .unwrap()
            .with("STRICT", "NO")
            .unwrap();
        assert_eq!(options.len(), 2);
        let ptr = options.as_ptr();
        unsafe {
            assert_eq!(CStr::from_ptr(*ptr).to_str().unwrap(), "MULTILINE=NO");
            assert_eq!(CStr::from_ptr(*ptr.add(1)).to_str().unwrap(), "STRICT=NO");
            assert!((*ptr.add(2)).is_null());
        }
    }

    #[test]
    fn test_nul_error() {
        let mut options = OptionList::new();
        assert!(options.push("AUTHORITY", "EP\0SG").is_err());
        assert!(options.as_ptr().is_null());
    }
}
