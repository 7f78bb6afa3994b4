// Copyright (C) 2022 by GiGa infosystems
//! Round-trip tests exercising the writer together with `giga-win-in`.
mod roundtrip;
