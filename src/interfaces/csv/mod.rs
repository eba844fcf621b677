pub mod payment_writer;

pub use payment_writer::PaymentWriter;
