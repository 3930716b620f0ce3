//! This wrapper, or generally having the train entry point be directly in `src`,
//! gives it access to the library's code.

use cgas_aid::train;

fn main() -> anyhow::Result<()> {
    train::main()
}
