//! Entry point for the binary.

use diagmine::common::*;

fn main() {
    // Work and report error if any.
    if let Err(errs) = diagmine::work() {
        if errs.is_timeout() {
            println!("(timeout)");
            ::std::process::exit(0)
        }
        print_err(&errs);
        ::std::process::exit(2)
    } else {
        ::std::process::exit(0)
    }
}
