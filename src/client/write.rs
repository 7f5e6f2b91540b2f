use super::create::S7Client;
use super::{BatchItem, S7WriteAccess};
use crate::errors::Error;
use crate::item::{Area, BitItem, DataItem};
use crate::s7_protocol::write_area::{write_bytes, write_items};
use crate::S7Pool;

/// *Methods for writing data into the PLC device*
impl S7Client {
    /// Write a defined number bytes into a specified data block with an offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (data_block, offset, data) = (100, 0, vec![0, 1, 2, 3]);
    /// let data = client.db_write(data_block, offset, &data)
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn db_write(&mut self, db_number: u16, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        self.validate_connection_info().await?;
        write_bytes(
            self.executor(),
            self.pdu_size(),
            Area::DataBlock,
            db_number,
            start,
            data,
            self.request_timeout(),
        )
        .await
    }

    /// Write a specific bit to a specified data block
    ///
    /// The bit number must be within the range 0..7
    /// # Example
    /// ```rust, ignore
    /// let (data_block, byte, bit, value) = (100, 0, 0, false);
    /// let bit = client.db_write_bit(data_block, byte, bit, value)
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn db_write_bit(
        &mut self,
        db_number: u16,
        byte: u32,
        bit: u8,
        value: bool,
    ) -> Result<(), Error> {
        self.validate_connection_info().await?;
        if bit > 7 {
            return Err(Error::RequestedBitOutOfRange);
        }

        let mut item = BitItem::new(Area::DataBlock, db_number, byte, bit, value);
        let mut results = write_items(
            self.executor(),
            self.pdu_size(),
            &mut [&mut item as &mut dyn DataItem],
            self.request_timeout(),
        )
        .await?;
        results.remove(0)
    }

    /// Write a mix of byte ranges and bits to a data block in a single
    /// batched request.
    /// # Errors
    ///
    /// Will return `Error` if the batch as a whole could not be sent; a
    /// failure on an individual item is reported in that item's own
    /// `Result` instead.
    pub async fn db_write_multi(
        &mut self,
        info: Vec<S7WriteAccess>,
    ) -> Result<Vec<Result<(), Error>>, Error> {
        self.validate_connection_info().await?;

        let mut items: Vec<BatchItem> = info
            .into_iter()
            .map(|access| BatchItem::for_write(access, Area::DataBlock))
            .collect();
        let mut refs: Vec<&mut dyn DataItem> =
            items.iter_mut().map(BatchItem::as_data_item_mut).collect();

        write_items(
            self.executor(),
            self.pdu_size(),
            &mut refs,
            self.request_timeout(),
        )
        .await
    }

    /// Write a defined number of bytes to the 'Merker area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length, data) = (0, 10, vec![0, 1]);
    /// let bit = client.mb_write(offset, length, &data)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn mb_write(&mut self, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        self.validate_connection_info().await?;
        write_bytes(
            self.executor(),
            self.pdu_size(),
            Area::Marker,
            0,
            start,
            data,
            self.request_timeout(),
        )
        .await
    }

    /// Write a defined number of bytes into the 'input value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length, data) = (0, 10, vec![0, 1]);
    /// let bit = client.i_write(offset, length, &data)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn i_write(&mut self, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        self.validate_connection_info().await?;
        write_bytes(
            self.executor(),
            self.pdu_size(),
            Area::Input,
            0,
            start,
            data,
            self.request_timeout(),
        )
        .await
    }

    /// Write a defined number of bytes into the 'output value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length, data) = (0, 10, vec![0, 1]);
    /// let bit = client.o_write(offset, length, &data)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn o_write(&mut self, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        self.validate_connection_info().await?;
        write_bytes(
            self.executor(),
            self.pdu_size(),
            Area::Output,
            0,
            start,
            data,
            self.request_timeout(),
        )
        .await
    }
}

/// *Methods for writing data into the PLC device*
impl S7Pool {
    /// Write a defined number bytes into a specified data block with an offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (data_block, offset, data) = (100, 0, vec![0, 1, 2, 3]);
    /// let data = client.db_read(data_block, offset, &data)
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn db_write(&self, db_number: u16, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        let mut connection = self.0.get().await?;
        connection.db_write(db_number, start, data).await
    }

    /// Write a specific bit to a specified data block
    ///
    /// The bit number must be within the range 0..7
    /// # Example
    /// ```rust, ignore
    /// let (data_block, byte, bit, value) = (100, 0, 0, false);
    /// let bit = client.db_read_bit(data_block, byte, bit, value)
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn db_write_bit(
        &self,
        db_number: u16,
        byte: u32,
        bit: u8,
        value: bool,
    ) -> Result<(), Error> {
        let mut connection = self.0.get().await?;
        connection.db_write_bit(db_number, byte, bit, value).await
    }

    /// Write a mix of byte ranges and bits to a data block in a single
    /// batched request.
    /// # Errors
    ///
    /// Will return `Error` if the batch as a whole could not be sent.
    pub async fn db_write_multi(
        &self,
        info: Vec<S7WriteAccess>,
    ) -> Result<Vec<Result<(), Error>>, Error> {
        let mut connection = self.0.get().await?;
        connection.db_write_multi(info).await
    }

    /// Write a defined number of bytes to the 'Merker area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length, data) = (0, 10, vec![0, 1]);
    /// let bit = client.mb_write(offset, length, &data)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn mb_write(&self, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        let mut connection = self.0.get().await?;
        connection.mb_write(start, data).await
    }

    /// Write a defined number of bytes into the 'input value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length, data) = (0, 10, vec![0, 1]);
    /// let bit = client.i_write(offset, length, &data)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn i_write(&self, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        let mut connection = self.0.get().await?;
        connection.i_write(start, data).await
    }

    /// Write a defined number of bytes into the 'output value area' of the PLC with a certain offset
    ///
    /// # Example
    /// ```rust, ignore
    /// let (offset, length, data) = (0, 10, vec![0, 1]);
    /// let bit = client.o_write(offset, length, &data)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn o_write(&self, start: u32, data: &Vec<u8>) -> Result<(), Error> {
        let mut connection = self.0.get().await?;
        connection.o_write(start, data).await
    }
}
