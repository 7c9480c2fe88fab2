use duckdb::{params, Connection};

use super::result::query_rows;

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn to_sql_definition(&self) -> String {
        let nullable_str = if self.nullable { "" } else { " NOT NULL" };
        format!("{} {}{}", quote_ident(&self.name), self.data_type, nullable_str)
    }
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Tables in the default `main` schema are referenced without a qualifier.
    pub fn qualified_name(&self) -> String {
        if self.schema == "main" {
            quote_ident(&self.name)
        } else {
            format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
        }
    }

    pub fn to_create_table_sql(&self) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|col| col.to_sql_definition())
            .collect();

        format!(
            "CREATE TABLE {} (\n    {}\n);",
            self.qualified_name(),
            columns_sql.join(",\n    ")
        )
    }
}

fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Lists user tables with their columns, in a stable order.
pub fn load_tables(conn: &Connection) -> duckdb::Result<Vec<TableSchema>> {
    let mut tables_stmt = conn.prepare(
        "SELECT table_schema, table_name FROM information_schema.tables
         WHERE table_catalog = current_database()
           AND table_schema NOT IN ('information_schema', 'pg_catalog')
         ORDER BY table_schema, table_name",
    )?;
    let names: Vec<(String, String)> = tables_stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<duckdb::Result<_>>()?;

    let mut columns_stmt = conn.prepare(
        "SELECT column_name, data_type, is_nullable FROM information_schema.columns
         WHERE table_catalog = current_database() AND table_schema = ? AND table_name = ?
         ORDER BY ordinal_position",
    )?;

    let mut tables = Vec::with_capacity(names.len());
    for (schema, name) in names {
        let columns = columns_stmt
            .query_map(params![schema, name], |row| {
                Ok(ColumnSchema {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    nullable: row.get::<_, String>(2)? == "YES",
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        tables.push(TableSchema {
            schema,
            name,
            columns,
        });
    }

    Ok(tables)
}

/// Schema description for the SQL prompt: DDL per table plus a few sample rows.
pub fn describe(conn: &Connection, sample_rows: usize) -> duckdb::Result<String> {
    let tables = load_tables(conn)?;
    if tables.is_empty() {
        return Ok("No tables found.".to_string());
    }

    let mut blocks = Vec::with_capacity(tables.len());
    for table in &tables {
        let mut block = table.to_create_table_sql();

        if sample_rows > 0 {
            let sample = query_rows(
                conn,
                &format!("SELECT * FROM {} LIMIT {}", table.qualified_name(), sample_rows),
            )?;

            block.push_str(&format!(
                "\n\n/*\n{} rows from {} table:\n",
                sample.rows().len(),
                table.name
            ));
            let header: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            block.push_str(&header.join("\t"));
            for row in sample.rows() {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                block.push('\n');
                block.push_str(&cells.join("\t"));
            }
            block.push_str("\n*/");
        }

        blocks.push(block);
    }

    Ok(blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE customers (id INTEGER NOT NULL, company_name VARCHAR);
             CREATE TABLE \"order details\" (order_id INTEGER, unit_price DECIMAL(10,2));
             INSERT INTO customers VALUES (1, 'Alfreds Futterkiste'), (2, 'Around the Horn'), (3, 'Berglunds');
             INSERT INTO \"order details\" VALUES (10248, 14.00);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_column_definition() {
        let col = ColumnSchema {
            name: "unit price".to_string(),
            data_type: "DOUBLE".to_string(),
            nullable: false,
        };
        assert_eq!(col.to_sql_definition(), "\"unit price\" DOUBLE NOT NULL");
    }

    #[test]
    fn test_create_table_sql_qualifies_non_main_schemas() {
        let table = TableSchema {
            schema: "sales".to_string(),
            name: "orders".to_string(),
            columns: vec![ColumnSchema {
                name: "id".to_string(),
                data_type: "INTEGER".to_string(),
                nullable: true,
            }],
        };
        assert_eq!(table.to_create_table_sql(), "CREATE TABLE sales.orders (\n    id INTEGER\n);");
    }

    #[test]
    fn test_load_tables_reads_columns_in_order() {
        let conn = seeded();
        let tables = load_tables(&conn).unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "order details"]);

        let customers = &tables[0];
        assert_eq!(customers.columns[0].name, "id");
        assert!(!customers.columns[0].nullable);
        assert_eq!(customers.columns[1].name, "company_name");
        assert!(customers.columns[1].nullable);
    }

    #[test]
    fn test_describe_includes_ddl_and_samples() {
        let conn = seeded();
        let description = describe(&conn, 2).unwrap();

        assert!(description.contains("CREATE TABLE customers ("));
        assert!(description.contains("id INTEGER NOT NULL"));
        assert!(description.contains("CREATE TABLE \"order details\""));
        assert!(description.contains("2 rows from customers table:"));
        assert!(description.contains("1\tAlfreds Futterkiste"));
        assert!(!description.contains("Berglunds"));
        assert!(description.contains("10248\t14"));
    }

    #[test]
    fn test_describe_without_samples() {
        let conn = seeded();
        let description = describe(&conn, 0).unwrap();
        assert!(description.contains("CREATE TABLE customers"));
        assert!(!description.contains("rows from"));
    }

    #[test]
    fn test_describe_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(describe(&conn, 2).unwrap(), "No tables found.");
    }
}
