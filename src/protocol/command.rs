use bson::{doc, Bson, Document};

use super::error::{DriverError, DriverResult};
use super::types::{Row, Ticker};
use super::value::{bson_as_i64, decode_rows, encode_args, encode_rows, int_to_bson, Value};

/// What a `run` request executes
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Raw SQL text
    Sql(String),
    /// Server-assigned prepared statement id
    Prepared(i64),
}

impl Statement {
    fn to_bson(&self) -> Bson {
        match self {
            Statement::Sql(sql) => Bson::String(sql.clone()),
            Statement::Prepared(id) => int_to_bson(*id),
        }
    }

    fn from_bson(bson: &Bson) -> DriverResult<Self> {
        match bson {
            Bson::String(sql) => Ok(Statement::Sql(sql.clone())),
            other => bson_as_i64(other).map(Statement::Prepared).ok_or_else(|| {
                DriverError::ProtocolError(format!(
                    "Statement must be SQL text or a prepared id, got {:?}",
                    other.element_type()
                ))
            }),
        }
    }
}

/// Request sent to the server.
///
/// On the wire this is a document with positional keys: `"0"` ticker,
/// `"1"` command name, `"2"` statement, `"3"` args.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Use { database: String },
    Prepare { sql: String },
    Run { statement: Statement, args: Vec<Value> },
    Batch { prepared_id: i64, rows: Vec<Row> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Use { .. } => "use",
            Command::Prepare { .. } => "prepare",
            Command::Run { .. } => "run",
            Command::Batch { .. } => "batch",
        }
    }

    pub fn to_document(&self, ticker: Ticker) -> DriverResult<Document> {
        let mut doc = doc! { "0": int_to_bson(ticker), "1": self.name() };
        match self {
            Command::Use { database } => {
                doc.insert("2", database.as_str());
            }
            Command::Prepare { sql } => {
                doc.insert("2", sql.as_str());
            }
            Command::Run { statement, args } => {
                doc.insert("2", statement.to_bson());
                doc.insert("3", Bson::Array(encode_args(args)?));
            }
            Command::Batch { prepared_id, rows } => {
                doc.insert("2", int_to_bson(*prepared_id));
                doc.insert("3", Bson::Array(encode_rows(rows)?));
            }
        }
        Ok(doc)
    }

    /// Server-side decode of a request document
    pub fn from_document(mut doc: Document) -> DriverResult<(Ticker, Command)> {
        let ticker = doc
            .get("0")
            .and_then(bson_as_i64)
            .ok_or_else(|| DriverError::ProtocolError("Request has no integer ticker".to_string()))?;
        let name = doc
            .get_str("1")
            .map_err(|_| DriverError::ProtocolError("Request has no command name".to_string()))?
            .to_string();
        let statement = doc.remove("2").ok_or_else(|| {
            DriverError::ProtocolError(format!("'{}' request has no statement", name))
        })?;

        let command = match name.as_str() {
            "use" => Command::Use {
                database: expect_string(statement, &name)?,
            },
            "prepare" => Command::Prepare {
                sql: expect_string(statement, &name)?,
            },
            "run" => {
                let args = match doc.remove("3") {
                    Some(Bson::Array(args)) => args
                        .into_iter()
                        .map(Value::from_bson)
                        .collect::<DriverResult<Vec<_>>>()?,
                    Some(Bson::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(DriverError::ProtocolError(format!(
                            "'run' args must be an array, got {:?}",
                            other.element_type()
                        )))
                    }
                };
                Command::Run {
                    statement: Statement::from_bson(&statement)?,
                    args,
                }
            }
            "batch" => {
                let prepared_id = bson_as_i64(&statement).ok_or_else(|| {
                    DriverError::ProtocolError("'batch' needs a prepared id".to_string())
                })?;
                let rows = match doc.remove("3") {
                    Some(Bson::Array(rows)) => decode_rows(rows)?.into_rows(),
                    Some(Bson::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(DriverError::ProtocolError(format!(
                            "'batch' rows must be an array, got {:?}",
                            other.element_type()
                        )))
                    }
                };
                Command::Batch { prepared_id, rows }
            }
            other => {
                return Err(DriverError::ProtocolError(format!(
                    "Unknown command: {}",
                    other
                )))
            }
        };
        Ok((ticker, command))
    }
}

fn expect_string(bson: Bson, name: &str) -> DriverResult<String> {
    match bson {
        Bson::String(s) => Ok(s),
        other => Err(DriverError::ProtocolError(format!(
            "'{}' expects a string, got {:?}",
            name,
            other.element_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_sql_document() {
        let cmd = Command::Run {
            statement: Statement::Sql("SELECT 1".to_string()),
            args: vec![],
        };
        let doc = cmd.to_document(7).unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["0", "1", "2", "3"]);
        assert_eq!(doc.get("0"), Some(&Bson::Int32(7)));
        assert_eq!(doc.get_str("1").unwrap(), "run");
        assert_eq!(doc.get_str("2").unwrap(), "SELECT 1");
        assert_eq!(doc.get_array("3").unwrap().len(), 0);
    }

    #[test]
    fn test_use_and_prepare_have_no_args() {
        let doc = Command::Use {
            database: "test".to_string(),
        }
        .to_document(1)
        .unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get_str("1").unwrap(), "use");

        let doc = Command::Prepare {
            sql: "INSERT INTO t VALUES(?)".to_string(),
        }
        .to_document(2)
        .unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get_str("2").unwrap(), "INSERT INTO t VALUES(?)");
    }

    #[test]
    fn test_batch_document_matrix() {
        let cmd = Command::Batch {
            prepared_id: 3,
            rows: vec![
                vec![Value::Int64(1), Value::from("a")],
                vec![Value::Int64(2), Value::from("b")],
            ],
        };
        let doc = cmd.to_document(9).unwrap();
        assert_eq!(doc.get("2"), Some(&Bson::Int32(3)));
        let matrix = doc.get_array("3").unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(
            matrix[1],
            Bson::Array(vec![Bson::Int32(2), Bson::String("b".into())])
        );
    }

    #[test]
    fn test_server_side_decode() {
        let cmd = Command::Run {
            statement: Statement::Prepared(4),
            args: vec![Value::Int32(1), Value::Null],
        };
        let doc = cmd.to_document(11).unwrap();
        let (ticker, decoded) = Command::from_document(doc).unwrap();
        assert_eq!(ticker, 11);
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn test_decode_unknown_command() {
        let doc = doc! { "0": 1, "1": "drop", "2": "x" };
        assert!(matches!(
            Command::from_document(doc),
            Err(DriverError::ProtocolError(_))
        ));
    }
}
