/*!
    master side controller for a daisy chained io module bus.

    The head unit discovers the modules chained on its right and left ports, hands each of them an address,
    reconciles what it found against the expected configuration, lays out the shared process image and
    then keeps cyclic data exchange running. The bus transport, the signal lines and the module drivers
    are collaborators plugged in through the traits of [master::hardware].

    - [registers] and [image] describe the process image and are usable without `std`
    - [master] holds the bridge state machine, it requires the `master` feature
*/
#![no_std]
#[cfg(feature = "std")]
extern crate std;

mod mutex;
mod utils;


pub mod registers;
pub mod image;
#[cfg(feature = "master")]
pub mod master;

pub use mutex::{BusyMutex, BusyMutexGuard};
