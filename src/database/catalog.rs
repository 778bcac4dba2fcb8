//! Reads stored procedures and their parameters from information_schema

use sqlx::mysql::MySqlPool;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::catalog::{Procedure, ProcedureCatalog};

use super::DatabaseError;

const ROUTINES_SQL: &str = "\
SELECT CAST(ROUTINE_NAME AS CHAR) AS name, CAST(ROUTINE_DEFINITION AS CHAR) AS definition \
FROM information_schema.ROUTINES \
WHERE ROUTINE_SCHEMA = DATABASE() AND ROUTINE_TYPE = 'PROCEDURE' \
ORDER BY ROUTINE_NAME";

const PARAMETERS_SQL: &str = "\
SELECT CAST(SPECIFIC_NAME AS CHAR) AS routine, CAST(PARAMETER_NAME AS CHAR) AS name \
FROM information_schema.PARAMETERS \
WHERE SPECIFIC_SCHEMA = DATABASE() AND ROUTINE_TYPE = 'PROCEDURE' AND PARAMETER_NAME IS NOT NULL \
ORDER BY SPECIFIC_NAME, ORDINAL_POSITION";

/// Load every procedure of the connected schema whose name starts with `prefix`
pub async fn load_catalog(pool: &MySqlPool, prefix: &str) -> Result<ProcedureCatalog, DatabaseError> {
    let mut parameters: HashMap<String, Vec<String>> = HashMap::new();
    for row in sqlx::query(PARAMETERS_SQL).fetch_all(pool).await? {
        let routine: String = row.try_get("routine")?;
        let name: String = row.try_get("name")?;
        parameters.entry(routine).or_default().push(name);
    }

    let mut procedures = Vec::new();
    for row in sqlx::query(ROUTINES_SQL).fetch_all(pool).await? {
        let name: String = row.try_get("name")?;
        if !name.starts_with(prefix) {
            continue;
        }

        // NULL when the connected user lacks privileges on the routine
        let definition: Option<String> = row.try_get("definition")?;
        let definition = definition.unwrap_or_else(|| {
            warn!("Definition of '{}' is not visible; metadata will be empty", name);
            String::new()
        });

        let params = parameters.remove(&name).unwrap_or_default();
        procedures.push(Procedure::new(name, definition, params));
    }

    let catalog = ProcedureCatalog::from_procedures(procedures, prefix);
    info!("Loaded {} procedures with prefix '{}'", catalog.len(), prefix);
    Ok(catalog)
}
