use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writable compressed-output handle.
pub trait OutputFile: Write + Send {
    /// Make written bytes durable. Called before an original is deleted.
    fn sync(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl OutputFile for File {
    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all()
    }
}

/// Where compressed bytes go. The filesystem in production; tests swap in
/// implementations that fail on purpose.
pub trait Destination: Send + Sync {
    fn create(&self, path: &Path) -> std::io::Result<Box<dyn OutputFile>>;
}

pub struct FsDestination;

impl Destination for FsDestination {
    fn create(&self, path: &Path) -> std::io::Result<Box<dyn OutputFile>> {
        Ok(Box::new(File::create(path)?))
    }
}
