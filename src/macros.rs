/// Helper macro for reading locked items
///
/// Surfaces lock poisoning as [`crate::Error::LockError`] instead of panicking,
/// so it can only be used inside functions returning [`crate::Result`].
///
/// ```rust, ignore
///  let data = read_lock!(self.inner);
///  println!("{}", data.name);
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().map_err(|_| $crate::Error::LockError)?
    };
}

/// Helper macro for writing to locked items
///
/// Surfaces lock poisoning as [`crate::Error::LockError`] instead of panicking,
/// so it can only be used inside functions returning [`crate::Result`].
///
/// ```rust, ignore
///  let mut data = write_lock!(self.inner);
///  data.name = "new_name".to_string();
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().map_err(|_| $crate::Error::LockError)?
    };
}
