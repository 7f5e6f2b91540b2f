use super::create::S7Client;
use super::{BatchItem, S7ReadAccess};
use crate::errors::Error;
use crate::item::{Area, BitItem, DataItem};
use crate::s7_protocol::read_area::{read_bytes, read_items};
use crate::S7Pool;

/// *Methods for reading from the PLC device*
impl S7Client {
    /// Read a defined number bytes from a specified data block with an offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (data_block, offset, length) = (100, 0, 4);
    /// let data = client.db_read(data_block, offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn db_read(&mut self, db_number: u16, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        self.validate_connection_info().await?;
        read_bytes(
            self.executor(),
            self.pdu_size(),
            Area::DataBlock,
            db_number,
            start,
            length,
            self.request_timeout(),
        )
        .await
    }

    /// Read a specific bit from a specified data block
    ///
    /// The bit number must be within the range 0..7
    /// # Example
    /// ```rust, ignore
    /// let (data_block, byte, bit) = (100, 0, 0);
    /// let bit = client.db_read_bit(data_block, byte, bit)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn db_read_bit(&mut self, db_number: u16, byte: u32, bit: u8) -> Result<bool, Error> {
        self.validate_connection_info().await?;
        if bit > 7 {
            return Err(Error::RequestedBitOutOfRange);
        }

        let mut item = BitItem::new(Area::DataBlock, db_number, byte, bit, false);
        let mut results = read_items(
            self.executor(),
            self.pdu_size(),
            &mut [&mut item as &mut dyn DataItem],
            self.request_timeout(),
        )
        .await?;
        results.remove(0)?;
        Ok(item.value())
    }

    /// Read a defined number of bytes from the 'Merker area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length) = (0, 10);
    /// let bit = client.mb_read(offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn mb_read(&mut self, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        self.validate_connection_info().await?;
        read_bytes(
            self.executor(),
            self.pdu_size(),
            Area::Marker,
            0,
            start,
            length,
            self.request_timeout(),
        )
        .await
    }

    /// Read a defined number of bytes from the 'input value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length) = (0, 10);
    /// let bit = client.i_read(offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn i_read(&mut self, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        self.validate_connection_info().await?;
        read_bytes(
            self.executor(),
            self.pdu_size(),
            Area::Input,
            0,
            start,
            length,
            self.request_timeout(),
        )
        .await
    }

    /// Read a defined number of bytes from the 'output value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length) = (0, 10);
    /// let bit = client.o_read(offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn o_read(&mut self, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        self.validate_connection_info().await?;
        read_bytes(
            self.executor(),
            self.pdu_size(),
            Area::Output,
            0,
            start,
            length,
            self.request_timeout(),
        )
        .await
    }

    /// Read a mix of byte ranges and bits from a data block in a single
    /// batched request.
    ///
    /// # Errors
    ///
    /// Will return `Error` if the batch as a whole could not be sent; a
    /// failure on an individual item is reported in that item's own
    /// `Result` instead.
    pub async fn db_read_multi(
        &mut self,
        info: Vec<S7ReadAccess>,
    ) -> Result<Vec<Result<Vec<u8>, Error>>, Error> {
        self.validate_connection_info().await?;

        let mut items: Vec<BatchItem> = info
            .into_iter()
            .map(|access| BatchItem::for_read(access, Area::DataBlock))
            .collect();
        let mut refs: Vec<&mut dyn DataItem> =
            items.iter_mut().map(BatchItem::as_data_item_mut).collect();

        let results = read_items(
            self.executor(),
            self.pdu_size(),
            &mut refs,
            self.request_timeout(),
        )
        .await?;
        drop(refs);

        Ok(items
            .into_iter()
            .zip(results)
            .map(|(item, result)| result.map(|()| item.into_bytes()))
            .collect())
    }
}

/// # Methods for reading from the PLC device
impl S7Pool {
    /// Read a defined number bytes from a specified data block with an offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (data_block, offset, length) = (100, 0, 4);
    /// let data = client.db_read(data_block, offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn db_read(&self, db_number: u16, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        let mut connection = self.0.get().await?;

        connection.db_read(db_number, start, length).await
    }

    /// Read a specific bit from a specified data block
    ///
    /// The bit number must be within the range 0..7
    /// # Example
    /// ```rust, ignore
    /// let (data_block, byte, bit) = (100, 0, 0);
    /// let bit = client.db_read_bit(data_block, byte, bit)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn db_read_bit(&self, db_number: u16, byte: u32, bit: u8) -> Result<bool, Error> {
        let mut connection = self.0.get().await?;

        connection.db_read_bit(db_number, byte, bit).await
    }

    /// Read a defined number of bytes from the 'Merker area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length) = (0, 10);
    /// let bit = client.mb_read(offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn mb_read(&self, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        let mut connection = self.0.get().await?;

        connection.mb_read(start, length).await
    }

    /// Read a defined number of bytes from the 'input value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length) = (0, 10);
    /// let bit = client.i_read(offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn i_read(&self, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        let mut connection = self.0.get().await?;

        connection.i_read(start, length).await
    }

    /// Read a defined number of bytes from the 'output value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length) = (0, 10);
    /// let bit = client.o_read(offset, length)
    ///     .await
    ///     .expect("Could not read from S7 client");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn o_read(&self, start: u32, length: u32) -> Result<Vec<u8>, Error> {
        let mut connection = self.0.get().await?;

        connection.o_read(start, length).await
    }

    /// Read a mix of byte ranges and bits from a data block in a single
    /// batched request.
    /// # Errors
    ///
    /// Will return `Error` if the batch as a whole could not be sent.
    pub async fn db_read_multi(
        &self,
        info: Vec<S7ReadAccess>,
    ) -> Result<Vec<Result<Vec<u8>, Error>>, Error> {
        let mut connection = self.0.get().await?;
        connection.db_read_multi(info).await
    }
}
