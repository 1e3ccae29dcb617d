// ABOUTME: The init command: writes a starter spec into the current checkout.
// ABOUTME: Refuses to overwrite an existing spec unless forced.

use crate::error::Result;
use crate::output::Output;
use crate::spec;

pub fn init(name: Option<&str>, force: bool, output: &Output) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = spec::init_spec(&cwd, name, force)?;
    output.success(&format!(
        "wrote {}; replace the example domains and servers before deploying",
        path.display()
    ));
    Ok(())
}
