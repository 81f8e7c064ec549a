//! List the bundled theme.

use quire_source::bundled;

/// Run the bundled command.
pub fn run() {
    for file in bundled::files() {
        println!("{file}");
    }
}
