use std::io::{Write, stdout};

/// Played on every pop. Errors are ignored by the caller.
pub trait Sound: Send + Sync {
    fn play(&self) -> std::io::Result<()>;
}

pub struct Silent;

impl Sound for Silent {
    fn play(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Terminal bell.
pub struct Bell;

impl Sound for Bell {
    fn play(&self) -> std::io::Result<()> {
        let mut out = stdout();
        out.write_all(b"\x07")?;
        out.flush()
    }
}
