use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Options, OrderId, Product};
use crate::order::Order;
use crate::{Action, Amount};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open script: {0}")]
    Open(#[source] csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized action type '{action}'")]
    UnrecognizedType { line: usize, action: String },

    #[error("line {line}: {action} missing {field}")]
    MissingField {
        line: usize,
        action: &'static str,
        field: &'static str,
    },

    #[error("line {line}: invalid {field} '{value}'")]
    InvalidValue {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// One script row. `detail` carries the free-form part of an action:
/// options as `key=value;key=value`, fees as `delivery;service;tax`, the
/// address text or the payment method.
#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    product: Option<String>,
    name: Option<String>,
    vendor: Option<String>,
    price: Option<f64>,
    quantity: Option<i64>,
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    order: OrderId,
    vendor: &'a str,
    status: &'static str,
    items: u32,
    subtotal: String,
    total: String,
}

/// Read actions from a csv file
pub fn read_actions(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Action, CsvError>>, CsvError> {
    let reader = builder().from_path(path).map_err(CsvError::Open)?;
    Ok(parse_rows(reader))
}

/// Read actions from any csv source
pub fn read_actions_from<R: io::Read>(
    source: R,
) -> impl Iterator<Item = Result<Action, CsvError>> {
    parse_rows(builder().from_reader(source))
}

/// Write orders as csv, one row per order in the given order
pub fn write_orders<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    out: impl io::Write,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for order in orders {
        writer.serialize(OutputRow {
            order: order.id,
            vendor: &order.vendor.name,
            status: order.status.as_str(),
            items: order.item_count(),
            subtotal: order.pricing.subtotal.to_string(),
            total: order.total().to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

fn builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All);
    builder
}

fn parse_rows<R: io::Read>(
    reader: csv::Reader<R>,
) -> impl Iterator<Item = Result<Action, CsvError>> {
    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_action(line, row)
        })
}

fn parse_action(line: usize, row: InputRow) -> Result<Action, CsvError> {
    let missing = |action, field| CsvError::MissingField {
        line,
        action,
        field,
    };

    match row.r#type.as_str() {
        "add" => {
            let product_id = row.product.ok_or_else(|| missing("add", "product"))?;
            let name = row.name.unwrap_or_else(|| product_id.clone());
            let vendor = row.vendor.ok_or_else(|| missing("add", "vendor"))?;
            let raw_price = row.price.ok_or_else(|| missing("add", "price"))?;
            let price = Amount::try_from_float(raw_price).ok_or_else(|| CsvError::InvalidValue {
                line,
                field: "price",
                value: raw_price.to_string(),
            })?;
            let quantity = match row.quantity {
                Some(quantity) => u32::try_from(quantity).map_err(|_| CsvError::InvalidValue {
                    line,
                    field: "quantity",
                    value: quantity.to_string(),
                })?,
                None => 1,
            };
            Ok(Action::AddItem {
                product: Product::new(
                    product_id,
                    name,
                    price,
                    vendor.clone(),
                    vendor,
                ),
                quantity,
                options: parse_options(line, row.detail.as_deref())?,
            })
        }
        "remove" => Ok(Action::RemoveItem {
            product_id: row.product.ok_or_else(|| missing("remove", "product"))?,
            options: parse_options(line, row.detail.as_deref())?,
        }),
        "quantity" => Ok(Action::UpdateQuantity {
            product_id: row.product.ok_or_else(|| missing("quantity", "product"))?,
            quantity: row.quantity.ok_or_else(|| missing("quantity", "quantity"))?,
            options: parse_options(line, row.detail.as_deref())?,
        }),
        "fees" => {
            let detail = row.detail.unwrap_or_default();
            let parts: Vec<&str> = detail.split(';').collect();
            if parts.len() > 3 {
                return Err(CsvError::InvalidValue {
                    line,
                    field: "fees",
                    value: detail.clone(),
                });
            }
            let fee = |idx: usize| match parts.get(idx) {
                Some(part) => parse_amount(line, part),
                None => Ok(None),
            };
            Ok(Action::UpdateFees {
                delivery_fee: fee(0)?,
                service_fee: fee(1)?,
                tax: fee(2)?,
            })
        }
        "address" => Ok(Action::SetDeliveryAddress(
            row.detail.ok_or_else(|| missing("address", "detail"))?,
        )),
        "checkout" => Ok(Action::Checkout {
            payment_method: row.detail.ok_or_else(|| missing("checkout", "detail"))?,
        }),
        "advance" => Ok(Action::AdvanceOrder),
        "cancel" => Ok(Action::CancelOrder),
        "reorder" => Ok(Action::Reorder),
        "clear" => Ok(Action::ClearCart),
        other => Err(CsvError::UnrecognizedType {
            line,
            action: other.to_string(),
        }),
    }
}

/// `size=large;sauce=bbq`; empty means no options.
fn parse_options(line: usize, detail: Option<&str>) -> Result<Options, CsvError> {
    let mut options = Options::new();
    for pair in detail.unwrap_or_default().split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CsvError::InvalidValue {
                line,
                field: "options",
                value: pair.to_string(),
            });
        };
        options.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(options)
}

fn parse_amount(line: usize, raw: &str) -> Result<Option<Amount>, CsvError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Amount::try_from_float)
        .map(Some)
        .ok_or_else(|| CsvError::InvalidValue {
            line,
            field: "fee",
            value: raw.to_string(),
        })
}
