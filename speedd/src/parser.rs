use crate::error::WireError;
use crate::models::Ticket;
use crate::types::PlateNumber;
use crate::wire::{
    Message, MESSAGE_TYPE_AM_CAMERA, MESSAGE_TYPE_AM_DISPATCHER, MESSAGE_TYPE_ERROR,
    MESSAGE_TYPE_HEARTBEAT, MESSAGE_TYPE_PLATE, MESSAGE_TYPE_TICKET, MESSAGE_TYPE_WANT_HEARTBEAT,
};
use nom::{
    branch::alt,
    bytes::streaming::tag,
    combinator::map,
    multi::length_count,
    number::streaming::{be_u16, be_u32, be_u8},
    sequence::tuple,
    IResult,
};

fn nom_u16_arr(input: &[u8]) -> IResult<&[u8], Vec<u16>> {
    length_count(be_u8, be_u16)(input)
}

fn nom_str(input: &[u8]) -> IResult<&[u8], PlateNumber> {
    length_count(be_u8, be_u8)(input)
}

fn nom_error(input: &[u8]) -> IResult<&[u8], Message> {
    map(tuple((tag([MESSAGE_TYPE_ERROR]), nom_str)), |(_, text)| {
        Message::Error(text)
    })(input)
}

fn nom_plate(input: &[u8]) -> IResult<&[u8], Message> {
    map(tuple((tag([MESSAGE_TYPE_PLATE]), nom_str, be_u32)), |(_, plate, timestamp)| {
        Message::Plate(plate, timestamp)
    })(input)
}

fn nom_ticket(input: &[u8]) -> IResult<&[u8], Message> {
    map(
        tuple((tag([MESSAGE_TYPE_TICKET]), nom_str, be_u16, be_u16, be_u32, be_u16, be_u32, be_u16)),
        |(_, plate, road, mile1, timestamp1, mile2, timestamp2, speed)| {
            Message::Ticket(Ticket { plate, road, mile1, timestamp1, mile2, timestamp2, speed })
        },
    )(input)
}

fn nom_want_heartbeat(input: &[u8]) -> IResult<&[u8], Message> {
    map(tuple((tag([MESSAGE_TYPE_WANT_HEARTBEAT]), be_u32)), |(_, interval)| {
        Message::WantHeartbeat(interval)
    })(input)
}

fn nom_heartbeat(input: &[u8]) -> IResult<&[u8], Message> {
    map(tag([MESSAGE_TYPE_HEARTBEAT]), |_| Message::Heartbeat)(input)
}

fn nom_camera(input: &[u8]) -> IResult<&[u8], Message> {
    map(tuple((tag([MESSAGE_TYPE_AM_CAMERA]), be_u16, be_u16, be_u16)), |(_, road, mile, limit)| {
        Message::IAmCamera(road, mile, limit)
    })(input)
}

fn nom_dispatcher(input: &[u8]) -> IResult<&[u8], Message> {
    map(tuple((tag([MESSAGE_TYPE_AM_DISPATCHER]), nom_u16_arr)), |(_, roads)| {
        Message::IAmDispatcher(roads)
    })(input)
}

/// Decode one frame from the front of a buffer. `Ok(None)` means the buffer
/// holds only part of a frame and more bytes are needed; `Ok(Some(_))`
/// carries the frame and the number of bytes it consumed.
pub(crate) fn decode(input: &[u8]) -> Result<Option<(Message, usize)>, WireError> {
    if input.is_empty() {
        return Ok(None);
    }
    match alt((
        nom_plate,
        nom_camera,
        nom_dispatcher,
        nom_want_heartbeat,
        nom_ticket,
        nom_error,
        nom_heartbeat,
    ))(input)
    {
        Ok((remainder, message)) => Ok(Some((message, input.len() - remainder.len()))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(_) => Err(WireError::UnknownType { tag: input[0] }),
    }
}

/// Classify a partial frame once end-of-input is certain: either the peer
/// declared a string longer than it ever sent, or it hung up mid-frame.
pub(crate) fn classify_truncation(input: &[u8]) -> WireError {
    match input.first() {
        Some(&MESSAGE_TYPE_ERROR) | Some(&MESSAGE_TYPE_PLATE) | Some(&MESSAGE_TYPE_TICKET) => {
            match input.get(1) {
                Some(&length) if input.len() < 2 + length as usize => WireError::StringEncoding,
                _ => WireError::MalformedFraming,
            }
        }
        _ => WireError::MalformedFraming,
    }
}
