//! Blocking HTTP GET transport over curl.
//!
//! Writes the response body sequentially to the destination file. Callers
//! run this inside `spawn_blocking` when on the async runtime.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use url::Url;

use super::error::AttemptError;

/// Curl transfer knobs. Defaults suit large dump downloads: generous hard
/// timeout, but abort quickly when the server stalls below 1 KiB/s.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    /// Abort when the transfer rate stays below this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... for this long.
    pub low_speed_time: Duration,
    /// Hard cap on the whole transfer.
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
        }
    }
}

/// Downloads `url` with a single GET into `dest`, replacing any existing
/// file. Returns the number of bytes written.
pub fn http_get_to_file(url: &Url, dest: &Path, opts: &HttpOptions) -> Result<u64, AttemptError> {
    let file = fs::File::create(dest).map_err(AttemptError::Storage)?;
    let out = RefCell::new(io::BufWriter::new(file));
    let write_err: RefCell<Option<io::Error>> = RefCell::new(None);
    let written = Cell::new(0u64);

    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str()).map_err(AttemptError::Curl)?;
    easy.follow_location(true).map_err(AttemptError::Curl)?;
    easy.max_redirections(10).map_err(AttemptError::Curl)?;
    easy.connect_timeout(opts.connect_timeout)
        .map_err(AttemptError::Curl)?;
    easy.low_speed_limit(opts.low_speed_limit)
        .map_err(AttemptError::Curl)?;
    easy.low_speed_time(opts.low_speed_time)
        .map_err(AttemptError::Curl)?;
    easy.timeout(opts.timeout).map_err(AttemptError::Curl)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match out.borrow_mut().write_all(data) {
                Ok(()) => {
                    written.set(written.get() + data.len() as u64);
                    Ok(data.len())
                }
                Err(e) => {
                    *write_err.borrow_mut() = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(AttemptError::Curl)?;
        if let Err(e) = transfer.perform() {
            // Curl reports an aborted write as its own error; the IO error
            // underneath is the one worth keeping.
            if let Some(io_err) = write_err.borrow_mut().take() {
                return Err(AttemptError::Storage(io_err));
            }
            return Err(AttemptError::Curl(e));
        }
    }

    out.into_inner()
        .flush()
        .map_err(AttemptError::Storage)?;

    let code = easy.response_code().map_err(AttemptError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(AttemptError::Http(code));
    }
    Ok(written.get())
}
