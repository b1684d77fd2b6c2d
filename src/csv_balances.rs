use rust_decimal::Decimal;

pub(crate) struct Writer<W>(W);

impl<W> Writer<W> {
    pub fn from_writer(writer: W) -> Writer<W> {
        Writer(writer)
    }
}

impl<W: std::io::Write> Writer<W> {
    /// Writes a `name,balance` header followed by one row per party, balances
    /// always with two decimal places.
    pub fn write_all<'a, I: Iterator<Item = (&'a str, Decimal)>>(
        self,
        balances_iterator: I,
    ) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(self.0);

        writer.write_record(&["name", "balance"])?;

        for (name, balance) in balances_iterator {
            let balance = format!("{:.2}", balance);
            writer.write_record([name, balance.as_str()])?;
        }

        writer.flush()?;
        Ok(())
    }
}
