//! Common repository traits
//!
//! Repositories are stateless: every operation borrows the connection it runs
//! on, so the same code serves pooled reads and unit-of-work transactions.

use sqlx::SqliteConnection;

/// Trait for creating new entities in the database
///
/// # Type Parameters
/// * `Entity` - Type of the returned entity (with ID assigned by the database)
/// * `CreateDTO` - Data for creation (without ID, generated by the database)
pub trait Create<Entity, CreateDTO> {
    /// Inserts a new row and returns the stored entity
    async fn create(conn: &mut SqliteConnection, data: &CreateDTO) -> Result<Entity, sqlx::Error>;
}

/// Trait for reading a single entity by primary key
///
/// # Type Parameters
/// * `Entity` - Type of the entity to read
/// * `Id` - Type of the primary key (e.g. `i64`, `str`)
pub trait Read<Entity, Id: ?Sized> {
    /// # Returns
    /// * `Ok(Some(Entity))` - Entity found
    /// * `Ok(None)` - No entity with that ID
    /// * `Err(sqlx::Error)` - Error during reading
    async fn read(conn: &mut SqliteConnection, id: &Id) -> Result<Option<Entity>, sqlx::Error>;
}

/// Trait for deleting entities
///
/// # Type Parameters
/// * `Id` - Type of the primary key
pub trait Delete<Id: ?Sized> {
    /// Deletes a row, returning the number of rows removed
    async fn delete(conn: &mut SqliteConnection, id: &Id) -> Result<u64, sqlx::Error>;
}
