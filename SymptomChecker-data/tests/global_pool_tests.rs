use symptom_checker_data::database::{
    get_connection_info, get_db_pool, initialize_database_pool, DatabaseError,
};

// The global pool is process-wide, so this binary holds a single test
#[test]
fn test_global_pool_initializes_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    std::env::set_var("DB_TYPE", "sqlite");
    std::env::set_var("DB_SQLITE_PATH", &path);

    assert!(matches!(get_db_pool(), Err(DatabaseError::PoolNotInitialized)));
    assert!(get_connection_info().is_none());

    initialize_database_pool().unwrap();
    let pool = get_db_pool().unwrap();
    assert!(!pool.is_in_memory());
    assert!(path.exists());
    assert!(get_connection_info().unwrap().contains("history.db"));

    let second = initialize_database_pool();
    assert!(matches!(second, Err(DatabaseError::PoolAlreadyInitialized)));
}
