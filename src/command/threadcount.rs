use anyhow::bail;
use anyhow::Result;
use log::warn;

///////////////////////////////
/// Threads to use: as given, else all available, else 1
pub fn determine_thread_count(total: Option<usize>) -> Result<usize> {
    match total {
        Some(0) => bail!("Cannot set number of threads to 0"),
        Some(total) => Ok(total),
        None => match std::thread::available_parallelism() {
            Ok(total) => Ok(total.get()),
            Err(_) => {
                warn!("Could not autodetect the number of threads available. Setting to 1, but it is better if you specify");
                Ok(1)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count() {
        assert_eq!(determine_thread_count(Some(3)).unwrap(), 3);
        assert!(determine_thread_count(Some(0)).is_err());
        assert!(determine_thread_count(None).unwrap() >= 1);
    }
}
