//! Cookie model, in-memory jar, and file persistence.

pub mod cookie;
pub mod jar;
pub mod persistence;

pub use cookie::Cookie;
pub use jar::CookieJar;
pub use persistence::FileCookieJar;

/// The jar a client works against: plain in-memory, or file-backed.
#[derive(Debug)]
pub enum JarHandle {
    Memory(CookieJar),
    File(FileCookieJar),
}

impl JarHandle {
    pub fn jar(&self) -> &CookieJar {
        match self {
            JarHandle::Memory(jar) => jar,
            JarHandle::File(file) => file.jar(),
        }
    }

    pub fn jar_mut(&mut self) -> &mut CookieJar {
        match self {
            JarHandle::Memory(jar) => jar,
            JarHandle::File(file) => file.jar_mut(),
        }
    }
}

impl Default for JarHandle {
    fn default() -> Self {
        JarHandle::Memory(CookieJar::new())
    }
}
