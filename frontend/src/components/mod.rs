pub mod spin_to_win;

pub use spin_to_win::SpinToWin;
