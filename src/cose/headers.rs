//! Protected and unprotected header parameter maps.
//!
//! Encoding writes the protected map wrapped in a byte string (present even
//! when empty) followed by the unprotected map. Decoding borrows every value
//! from the message, and the protected bytes stay as they were received so
//! the authenticated structure can be rebuilt from them verbatim.

use core::fmt;
use core::ops::Range;
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use super::{
    Error, Result, HEADER_PARAM_ALG, HEADER_PARAM_CONTENT_TYPE, HEADER_PARAM_CRIT,
    HEADER_PARAM_IV, HEADER_PARAM_KID, HEADER_PARAM_PARTIAL_IV, MAX_PARAMETERS,
};
use crate::cbor::{self, Encoder};

/// Value of a header parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamValue<'a> {
    Uint(u64),
    Int(i64),
    Text(&'a str),
    Bytes(&'a [u8]),
    /// Decoded value of a type this codec does not model. Cannot be encoded.
    Other,
}

impl ParamValue<'_> {
    fn write(&self, enc: &mut Encoder<'_>) -> Result<()> {
        match *self {
            ParamValue::Uint(v) => enc.add_uint(v),
            ParamValue::Int(v) => enc.add_int(v),
            ParamValue::Text(t) => enc.add_text(t),
            ParamValue::Bytes(b) => enc.add_bytes(b),
            ParamValue::Other => return Err(Error::ParameterCbor),
        }
        Ok(())
    }
}

/// One header parameter with its placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderParam<'a> {
    pub label: i64,
    pub value: ParamValue<'a>,
    /// Listed in `crit`. Only allowed on protected parameters.
    pub critical: bool,
    pub protected: bool,
}

const EMPTY_PARAM: HeaderParam<'static> = HeaderParam {
    label: 0,
    value: ParamValue::Other,
    critical: false,
    protected: false,
};

impl<'a> HeaderParam<'a> {
    pub fn new(label: i64, value: ParamValue<'a>) -> Self {
        HeaderParam {
            label,
            value,
            critical: false,
            protected: false,
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// The algorithm ID, always protected.
    pub fn alg_id(cose_alg_id: i32) -> Self {
        let value = if cose_alg_id >= 0 {
            ParamValue::Uint(cose_alg_id as u64)
        } else {
            ParamValue::Int(i64::from(cose_alg_id))
        };
        HeaderParam::new(HEADER_PARAM_ALG, value).protected()
    }

    pub fn kid(kid: &'a [u8]) -> Self {
        HeaderParam::new(HEADER_PARAM_KID, ParamValue::Bytes(kid))
    }

    pub fn content_type_uint(content_type: u16) -> Self {
        HeaderParam::new(
            HEADER_PARAM_CONTENT_TYPE,
            ParamValue::Uint(u64::from(content_type)),
        )
    }

    pub fn content_type_tstr(content_type: &'a str) -> Self {
        HeaderParam::new(HEADER_PARAM_CONTENT_TYPE, ParamValue::Text(content_type))
    }

    pub fn iv(iv: &'a [u8]) -> Self {
        HeaderParam::new(HEADER_PARAM_IV, ParamValue::Bytes(iv))
    }

    pub fn partial_iv(partial_iv: &'a [u8]) -> Self {
        HeaderParam::new(HEADER_PARAM_PARTIAL_IV, ParamValue::Bytes(partial_iv))
    }
}

fn is_known_label(label: i64) -> bool {
    matches!(
        label,
        HEADER_PARAM_ALG
            | HEADER_PARAM_CONTENT_TYPE
            | HEADER_PARAM_KID
            | HEADER_PARAM_IV
            | HEADER_PARAM_PARTIAL_IV
    )
}

/// Checks a set of parameter lists before anything is written.
fn check_params(lists: &[&[HeaderParam<'_>]]) -> Result<()> {
    let all = || lists.iter().flat_map(|l| l.iter());
    for (i, p) in all().enumerate() {
        if p.label == HEADER_PARAM_CRIT || p.value == ParamValue::Other {
            return Err(Error::ParameterCbor);
        }
        if p.critical && !p.protected {
            return Err(Error::ParameterNotProtected);
        }
        if all().skip(i + 1).any(|q| q.label == p.label) {
            log::debug!("header parameter {} given twice", p.label);
            return Err(Error::DuplicateParameter);
        }
    }
    Ok(())
}

/// Writes the protected header block and the unprotected map for the
/// parameters in `lists`.
///
/// All lists are checked before the first byte goes out, so on error the
/// encoder is untouched. Returns where the protected map's bytes sit in the
/// output; the range is only meaningful when writing and stays valid until
/// an enclosing array or map is closed.
pub fn encode_headers(enc: &mut Encoder<'_>, lists: &[&[HeaderParam<'_>]]) -> Result<Range<usize>> {
    check_params(lists)?;
    let all = || lists.iter().flat_map(|l| l.iter());

    enc.open_bstr_wrap();
    enc.open_map();
    for p in all().filter(|p| p.protected) {
        enc.add_int(p.label);
        p.value.write(enc)?;
    }
    if all().any(|p| p.critical) {
        enc.add_int(HEADER_PARAM_CRIT);
        enc.open_array();
        for p in all().filter(|p| p.critical) {
            enc.add_int(p.label);
        }
        enc.close_array();
    }
    enc.close_map();
    let protected = enc.close_bstr_wrap();

    enc.open_map();
    for p in all().filter(|p| !p.protected) {
        enc.add_int(p.label);
        p.value.write(enc)?;
    }
    enc.close_map();

    Ok(protected)
}

enum Label {
    Int(i64),
    /// Text labels, and integers too large to be a label this codec knows.
    Skipped,
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct LabelVisitor;

        impl<'de> Visitor<'de> for LabelVisitor {
            type Value = Label;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an integer or text label")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> core::result::Result<Label, E> {
                Ok(i64::try_from(v).map(Label::Int).unwrap_or(Label::Skipped))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> core::result::Result<Label, E> {
                Ok(Label::Int(v))
            }

            fn visit_str<E: de::Error>(self, _: &str) -> core::result::Result<Label, E> {
                Ok(Label::Skipped)
            }
        }

        deserializer.deserialize_any(LabelVisitor)
    }
}

impl<'de> Deserialize<'de> for ParamValue<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = ParamValue<'de>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a header parameter value")
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Other)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Uint(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Int(v))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Other)
            }

            fn visit_borrowed_str<E: de::Error>(
                self,
                v: &'de str,
            ) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Text(v))
            }

            fn visit_borrowed_bytes<E: de::Error>(
                self,
                v: &'de [u8],
            ) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Bytes(v))
            }

            fn visit_unit<E: de::Error>(self) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Other)
            }

            fn visit_none<E: de::Error>(self) -> core::result::Result<Self::Value, E> {
                Ok(ParamValue::Other)
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> core::result::Result<Self::Value, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(ParamValue::Other)
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> core::result::Result<Self::Value, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(ParamValue::Other)
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Labels listed in a `crit` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CritLabels {
    labels: [i64; MAX_PARAMETERS],
    len: usize,
    fault: Option<Error>,
}

impl<'de> Deserialize<'de> for CritLabels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct CritVisitor;

        impl<'de> Visitor<'de> for CritVisitor {
            type Value = CritLabels;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an array of critical labels")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> core::result::Result<CritLabels, A::Error> {
                let mut crit = CritLabels {
                    labels: [0; MAX_PARAMETERS],
                    len: 0,
                    fault: None,
                };
                while let Some(label) = seq.next_element::<Label>()? {
                    match label {
                        Label::Skipped => {
                            crit.fault.get_or_insert(Error::UnknownCriticalParameter);
                        }
                        Label::Int(_) if crit.len == MAX_PARAMETERS => {
                            crit.fault.get_or_insert(Error::TooManyParameters);
                        }
                        Label::Int(l) => {
                            crit.labels[crit.len] = l;
                            crit.len += 1;
                        }
                    }
                }
                if crit.len == 0 {
                    crit.fault.get_or_insert(Error::ParameterCbor);
                }
                Ok(crit)
            }
        }

        deserializer.deserialize_seq(CritVisitor)
    }
}

/// The parameters of one header map, in the order they were given.
///
/// Problems that are about meaning rather than CBOR (a label given twice,
/// too many parameters, a bad `crit`) do not stop decoding; the first one is
/// kept and reported by [`decode_headers`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamList<'a> {
    params: [HeaderParam<'a>; MAX_PARAMETERS],
    len: usize,
    crit: Option<CritLabels>,
    fault: Option<Error>,
}

impl Default for ParamList<'_> {
    fn default() -> Self {
        ParamList {
            params: [EMPTY_PARAM; MAX_PARAMETERS],
            len: 0,
            crit: None,
            fault: None,
        }
    }
}

impl<'a> ParamList<'a> {
    pub fn push(&mut self, param: HeaderParam<'a>) -> Result<()> {
        if self.get(param.label).is_some() {
            return Err(Error::DuplicateParameter);
        }
        let slot = self.params.get_mut(self.len).ok_or(Error::TooManyParameters)?;
        *slot = param;
        self.len += 1;
        Ok(())
    }

    pub fn get(&self, label: i64) -> Option<&HeaderParam<'a>> {
        self.as_slice().iter().find(|p| p.label == label)
    }

    pub fn as_slice(&self) -> &[HeaderParam<'a>] {
        &self.params[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Labels of the `crit` parameter, empty if there is none.
    pub fn crit_labels(&self) -> &[i64] {
        match &self.crit {
            Some(crit) => &crit.labels[..crit.len],
            None => &[],
        }
    }

    fn record(&mut self, fault: Error) {
        self.fault.get_or_insert(fault);
    }

    fn check(&self) -> Result<()> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

impl<'de> Deserialize<'de> for ParamList<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ParamList<'de>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a header parameter map")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> core::result::Result<Self::Value, A::Error> {
                let mut list = ParamList::default();
                while let Some(label) = map.next_key::<Label>()? {
                    match label {
                        Label::Skipped => {
                            map.next_value::<IgnoredAny>()?;
                        }
                        Label::Int(HEADER_PARAM_CRIT) => {
                            let crit = map.next_value::<CritLabels>()?;
                            if list.crit.is_some() {
                                list.record(Error::DuplicateParameter);
                            }
                            if let Some(fault) = crit.fault {
                                list.record(fault);
                            }
                            list.crit = Some(crit);
                        }
                        Label::Int(l) => {
                            let value = map.next_value::<ParamValue>()?;
                            if let Err(fault) = list.push(HeaderParam::new(l, value)) {
                                list.record(fault);
                            }
                        }
                    }
                }
                Ok(list)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// A content type, as a CoAP content format or a media type string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType<'a> {
    Uint(u16),
    Text(&'a str),
}

/// The parameters this crate understands, merged from both maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Parameters<'a> {
    pub cose_algorithm_id: Option<i32>,
    pub kid: Option<&'a [u8]>,
    pub iv: Option<&'a [u8]>,
    pub partial_iv: Option<&'a [u8]>,
    pub content_type: Option<ContentType<'a>>,
}

impl<'a> Parameters<'a> {
    fn collect(lists: &[&ParamList<'a>]) -> Result<Self> {
        let mut out = Parameters::default();
        for p in lists.iter().flat_map(|l| l.as_slice()) {
            match (p.label, p.value) {
                (HEADER_PARAM_ALG, ParamValue::Uint(v)) => {
                    out.cose_algorithm_id =
                        Some(i32::try_from(v).map_err(|_| Error::ParameterCbor)?);
                }
                (HEADER_PARAM_ALG, ParamValue::Int(v)) => {
                    out.cose_algorithm_id =
                        Some(i32::try_from(v).map_err(|_| Error::ParameterCbor)?);
                }
                (HEADER_PARAM_KID, ParamValue::Bytes(b)) => out.kid = Some(b),
                (HEADER_PARAM_IV, ParamValue::Bytes(b)) => out.iv = Some(b),
                (HEADER_PARAM_PARTIAL_IV, ParamValue::Bytes(b)) => out.partial_iv = Some(b),
                (HEADER_PARAM_CONTENT_TYPE, ParamValue::Uint(v)) => {
                    let v = u16::try_from(v).map_err(|_| Error::ParameterCbor)?;
                    out.content_type = Some(ContentType::Uint(v));
                }
                (HEADER_PARAM_CONTENT_TYPE, ParamValue::Text(t)) => {
                    out.content_type = Some(ContentType::Text(t));
                }
                (label, _) if is_known_label(label) => {
                    log::debug!("header parameter {} has the wrong type", label);
                    return Err(Error::ParameterCbor);
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// The algorithm ID, which every message must carry.
    pub fn require_alg(&self) -> Result<i32> {
        self.cose_algorithm_id.ok_or(Error::NoAlgId)
    }
}

/// Both header maps of a message, checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedHeaders<'a> {
    pub protected: ParamList<'a>,
    pub unprotected: ParamList<'a>,
    pub parameters: Parameters<'a>,
}

/// Decodes the protected header bytes and checks them together with the
/// already decoded unprotected map.
///
/// An empty protected byte string is an empty map. Whether the algorithm ID
/// is present is left to the caller, see [`Parameters::require_alg`].
pub fn decode_headers<'a>(
    protected_bytes: &'a [u8],
    unprotected: ParamList<'a>,
) -> Result<DecodedHeaders<'a>> {
    let mut protected = if protected_bytes.is_empty() {
        ParamList::default()
    } else {
        cbor::decode::<ParamList>(protected_bytes).map_err(|_| Error::ParameterCbor)?
    };
    protected.check()?;
    unprotected.check()?;

    if unprotected.crit.is_some() || unprotected.get(HEADER_PARAM_ALG).is_some() {
        return Err(Error::ParameterNotProtected);
    }
    if unprotected
        .as_slice()
        .iter()
        .any(|p| protected.get(p.label).is_some())
    {
        return Err(Error::DuplicateParameter);
    }

    let crit = protected.crit;
    let len = protected.len;
    for p in protected.params[..len].iter_mut() {
        p.protected = true;
    }
    if let Some(crit) = crit {
        for &label in &crit.labels[..crit.len] {
            if !is_known_label(label) {
                log::debug!("critical header parameter {} not understood", label);
                return Err(Error::UnknownCriticalParameter);
            }
            let p = protected.params[..len]
                .iter_mut()
                .find(|p| p.label == label)
                .ok_or(Error::ParameterCbor)?;
            p.critical = true;
        }
    }

    let parameters = Parameters::collect(&[&protected, &unprotected])?;
    Ok(DecodedHeaders {
        protected,
        unprotected,
        parameters,
    })
}
