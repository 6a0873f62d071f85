pub mod count;
pub mod run;
pub mod threadcount;

pub use count::CountCMD;
pub use run::CountingArgs;
pub use run::RunCMD;
pub use threadcount::determine_thread_count;
