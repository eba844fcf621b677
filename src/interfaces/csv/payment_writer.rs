use crate::domain::payment::Payment;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Flat CSV row for a payment; the gateway payload is left out.
#[derive(Debug, Serialize)]
struct PaymentRow<'a> {
    tx_ref: &'a str,
    booking_id: &'a str,
    tenant_id: &'a str,
    house_id: &'a str,
    amount: String,
    currency: &'a str,
    status: &'a str,
    created_at: String,
    verified_at: String,
}

impl<'a> From<&'a Payment> for PaymentRow<'a> {
    fn from(payment: &'a Payment) -> Self {
        Self {
            tx_ref: payment.tx_ref.as_str(),
            booking_id: &payment.booking_id,
            tenant_id: &payment.tenant_id,
            house_id: &payment.house_id,
            amount: payment.amount.to_string(),
            currency: payment.currency.as_str(),
            status: payment.status.as_str(),
            created_at: payment.created_at.to_rfc3339(),
            verified_at: payment
                .verified_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

const HEADER: [&str; 9] = [
    "tx_ref",
    "booking_id",
    "tenant_id",
    "house_id",
    "amount",
    "currency",
    "status",
    "created_at",
    "verified_at",
];

/// Writes payment records as CSV to any `Write` sink (e.g. Stdout, File).
/// The header is written even when there are no rows.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
            header_written: false,
        }
    }

    pub fn write_payments<'a>(
        &mut self,
        payments: impl IntoIterator<Item = &'a Payment>,
    ) -> Result<()> {
        if !self.header_written {
            self.writer.write_record(HEADER)?;
            self.header_written = true;
        }
        for payment in payments {
            self.writer.serialize(PaymentRow::from(payment))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
